#![cfg(unix)]

use alvr_freepie_bridge::{RegionGate, SharedRegion, REGION_SIZE};
use std::{process, thread};

const WORKERS: usize = 2;
const CYCLES: usize = 10_000;
const PAYLOAD_OFFSET: usize = 16;
const PAYLOAD_LEN: usize = 64;

fn checksum(generation: u64, payload: &[u8]) -> u64 {
    payload.iter().fold(generation, |acc, byte| {
        acc.wrapping_mul(31).wrapping_add(u64::from(*byte))
    })
}

fn read_u64(bytes: &[u8], offset: usize) -> u64 {
    let mut raw = [0; 8];
    raw.copy_from_slice(&bytes[offset..offset + 8]);
    u64::from_le_bytes(raw)
}

fn write_u64(bytes: &mut [u8], offset: usize, value: u64) {
    bytes[offset..offset + 8].copy_from_slice(&value.to_le_bytes());
}

// Every writer stamps a generation plus a checksum over the payload it fills;
// a reader that ever sees bytes from two different generations fails the
// checksum.
#[test]
fn concurrent_exchanges_never_tear() {
    let pid = process::id();
    let region_name = format!("freepie_bridge_tear_{pid}_region");
    let gate_name = format!("freepie_bridge_tear_{pid}_gate");

    let mut region = SharedRegion::create(&region_name, REGION_SIZE).unwrap();
    let gate = RegionGate::open(&gate_name).unwrap();
    {
        let _lease = gate.acquire().unwrap();
        let bytes = region.view();
        bytes.fill(0);
        let seed = checksum(0, &bytes[PAYLOAD_OFFSET..PAYLOAD_OFFSET + PAYLOAD_LEN]);
        write_u64(bytes, 8, seed);
    }

    let workers: Vec<_> = (0..WORKERS)
        .map(|worker| {
            let region_name = region_name.clone();
            let gate_name = gate_name.clone();

            thread::spawn(move || {
                // each worker attaches on its own, like a separate process
                let mut region = SharedRegion::open(&region_name, REGION_SIZE)
                    .unwrap()
                    .unwrap();
                let gate = RegionGate::open(&gate_name).unwrap();

                for _ in 0..CYCLES {
                    let _lease = gate.acquire().unwrap();
                    let bytes = region.view();

                    let generation = read_u64(bytes, 0);
                    let stored = read_u64(bytes, 8);
                    let payload = &bytes[PAYLOAD_OFFSET..PAYLOAD_OFFSET + PAYLOAD_LEN];
                    assert_eq!(
                        stored,
                        checksum(generation, payload),
                        "worker {worker} observed a torn record at generation {generation}"
                    );

                    let next = generation + 1;
                    let fill = (next % 251) as u8;
                    bytes[PAYLOAD_OFFSET..PAYLOAD_OFFSET + PAYLOAD_LEN].fill(fill);
                    let sum = checksum(next, &bytes[PAYLOAD_OFFSET..PAYLOAD_OFFSET + PAYLOAD_LEN]);
                    write_u64(bytes, 0, next);
                    write_u64(bytes, 8, sum);
                }
            })
        })
        .collect();

    for worker in workers {
        worker.join().unwrap();
    }

    {
        let _lease = gate.acquire().unwrap();
        let bytes = region.view();
        assert_eq!(read_u64(bytes, 0), (WORKERS * CYCLES) as u64);
    }

    RegionGate::unlink(&gate_name);
}
