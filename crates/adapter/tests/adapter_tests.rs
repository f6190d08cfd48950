//! Integration tests for LptAdapter
//!
//! Tests device presence handling and transfer recovery including:
//! - Writes and reads while the adapter is absent
//! - Single-retry recovery after unplug/replug
//! - Error propagation on repeated failure
//! - Permission failures without retries
//! - Chunked raw writes

use adapter::test_utils::{IN_ENDPOINT, MockBackend, OUT_ENDPOINT, Transfer};
use adapter::{AdapterError, AdapterOptions, LptAdapter, MismatchReason, Outcome};
use protocol::{MAX_TRANSFER_SIZE, Register};
use rand::Rng;

fn adapter(backend: &MockBackend) -> LptAdapter<MockBackend> {
    LptAdapter::with_backend(backend.clone(), AdapterOptions::default())
        .expect("adapter construction")
}

fn write_sizes(transfers: &[Transfer]) -> Vec<usize> {
    transfers
        .iter()
        .filter_map(|t| match t {
            Transfer::Write { data, .. } => Some(data.len()),
            Transfer::Read { .. } => None,
        })
        .collect()
}

mod absent_device {
    use super::*;

    #[test]
    fn test_write_while_unbound_is_silent() {
        let backend = MockBackend::empty();
        let mut lpt = adapter(&backend);

        let outcome = lpt.write_one(Register::Data, 0xff).unwrap();

        assert_eq!(outcome, Outcome::DeviceAbsent);
        let state = backend.state();
        assert!(state.transfers.is_empty());
        assert_eq!(state.opens, 0);
    }

    #[test]
    fn test_every_operation_tolerates_absence() {
        let backend = MockBackend::empty();
        let mut lpt = adapter(&backend);

        assert!(lpt.read_one(Register::Status).unwrap().is_absent());
        assert!(lpt.write_many([(0, 1), (0, 2)]).unwrap().is_absent());
        assert!(lpt.write_raw(&[0; 200], 4).unwrap().is_absent());
        assert!(backend.transfers().is_empty());
    }

    #[test]
    fn test_unplug_detected_on_next_write() {
        let backend = MockBackend::with_adapter();
        let mut lpt = adapter(&backend);
        assert!(lpt.write_one(0u8, 1).unwrap().is_delivered());

        backend.unplug();

        // Still optimistically bound until a transfer fails
        assert!(lpt.is_bound());
        assert_eq!(lpt.write_one(0u8, 2).unwrap(), Outcome::DeviceAbsent);
        assert!(!lpt.is_bound());

        let enumerations = backend.state().enumerations;
        assert_eq!(lpt.write_one(0u8, 3).unwrap(), Outcome::DeviceAbsent);
        assert_eq!(backend.state().enumerations, enumerations);
    }
}

mod recovery {
    use super::*;

    #[test]
    fn test_single_failure_is_absorbed() {
        let backend = MockBackend::with_adapter();
        let mut lpt = adapter(&backend);
        let enumerations = backend.state().enumerations;
        backend.fail_next_transfers([rusb::Error::Io]);

        let outcome = lpt.write_one(Register::Data, 0x0f).unwrap();

        assert_eq!(outcome, Outcome::Delivered(()));
        assert_eq!(
            backend.transfers(),
            vec![Transfer::Write {
                endpoint: OUT_ENDPOINT,
                data: vec![0, 0x0f]
            }]
        );
        assert_eq!(backend.state().enumerations, enumerations + 1);
    }

    #[test]
    fn test_double_failure_propagates() {
        let backend = MockBackend::with_adapter();
        let mut lpt = adapter(&backend);
        backend.fail_next_transfers([rusb::Error::Io, rusb::Error::Pipe]);

        let err = lpt.write_one(Register::Data, 0x0f).unwrap_err();

        assert!(matches!(
            err,
            AdapterError::Io {
                source: rusb::Error::Pipe,
                ..
            }
        ));
        assert!(backend.transfers().is_empty());
    }

    #[test]
    fn test_no_retry_loop_after_double_failure() {
        let backend = MockBackend::with_adapter();
        let mut lpt = adapter(&backend);
        backend.fail_next_transfers([rusb::Error::Io, rusb::Error::Io, rusb::Error::Io]);

        assert!(lpt.write_one(0u8, 1).is_err());

        // Exactly two attempts were made; the third failure is still queued
        assert_eq!(backend.state().transfer_failures.len(), 1);
    }

    #[test]
    fn test_adapter_usable_after_propagated_failure() {
        let backend = MockBackend::with_adapter();
        let mut lpt = adapter(&backend);
        backend.fail_next_transfers([rusb::Error::Io, rusb::Error::Io]);

        assert!(lpt.write_one(0u8, 1).is_err());
        assert!(lpt.write_one(0u8, 2).unwrap().is_delivered());
    }

    #[test]
    fn test_replug_between_writes_rebinds_new_address() {
        let backend = MockBackend::with_adapter();
        let mut lpt = adapter(&backend);
        assert!(lpt.write_one(0u8, 1).unwrap().is_delivered());
        let before = lpt.identity().unwrap();

        backend.unplug();
        backend.replug();

        assert!(lpt.write_one(0u8, 2).unwrap().is_delivered());
        let after = lpt.identity().unwrap();
        assert_ne!(before.address, after.address);
        assert_eq!(backend.written_bytes(), vec![0, 1, 0, 2]);
    }

    #[test]
    fn test_replug_before_first_write_recovers_on_open() {
        let backend = MockBackend::with_adapter();
        let mut lpt = adapter(&backend);
        let enumerations = backend.state().enumerations;

        // The session is closed, so the stale device fails on lazy open
        backend.unplug();
        backend.replug();

        assert_eq!(lpt.write_one(0u8, 7).unwrap(), Outcome::Delivered(()));
        assert_eq!(backend.state().enumerations, enumerations + 1);
        assert_eq!(backend.written_bytes(), vec![0, 7]);
    }

    #[test]
    fn test_read_recovers_as_a_unit() {
        let backend = MockBackend::with_adapter();
        let mut lpt = adapter(&backend);
        backend.queue_read([0x5a]);
        backend.fail_next_transfers([rusb::Error::NoDevice]);

        assert_eq!(lpt.read_one(Register::Data).unwrap(), Outcome::Delivered(0x5a));
        assert_eq!(
            backend.transfers(),
            vec![
                Transfer::Write {
                    endpoint: OUT_ENDPOINT,
                    data: vec![0x10]
                },
                Transfer::Read {
                    endpoint: IN_ENDPOINT,
                    len: 1
                },
            ]
        );
    }
}

mod permissions {
    use super::*;

    #[test]
    fn test_denied_claim_fails_construction() {
        let backend = MockBackend::with_adapter();
        backend.deny_claim();

        let err = LptAdapter::with_backend(backend.clone(), AdapterOptions::default())
            .unwrap_err();

        assert!(matches!(err, AdapterError::PermissionDenied { .. }));
        let state = backend.state();
        assert_eq!(state.enumerations, 1);
        assert_eq!(state.opens, 1);
    }

    #[test]
    fn test_denied_claim_is_not_retried() {
        let backend = MockBackend::with_adapter();
        let mut lpt = adapter(&backend);
        backend.deny_claim();
        let (enumerations, opens) = {
            let state = backend.state();
            (state.enumerations, state.opens)
        };

        let err = lpt.write_one(Register::Data, 1).unwrap_err();

        assert!(matches!(err, AdapterError::PermissionDenied { .. }));
        let state = backend.state();
        assert_eq!(state.enumerations, enumerations);
        assert_eq!(state.opens, opens + 1);
    }

    #[test]
    fn test_denied_open_reports_device() {
        let backend = MockBackend::with_adapter();
        backend.deny_open();

        let err = LptAdapter::with_backend(backend.clone(), AdapterOptions::default())
            .unwrap_err();
        assert!(err.to_string().contains("5348:"));
    }
}

mod discovery {
    use super::*;

    #[test]
    fn test_foreign_firmware_is_protocol_mismatch() {
        let backend = MockBackend::with_adapter();
        backend.set_interfaces(vec![]);

        let err = LptAdapter::with_backend(backend.clone(), AdapterOptions::default())
            .unwrap_err();
        assert!(matches!(
            err,
            AdapterError::ProtocolMismatch {
                reason: MismatchReason::NoVendorInterface,
                ..
            }
        ));
    }

    #[test]
    fn test_custom_vendor_id() {
        let backend = MockBackend::with_adapter();
        let options = AdapterOptions {
            vendor_id: 0x1234,
            ..AdapterOptions::default()
        };

        let lpt = LptAdapter::with_backend(backend, options).unwrap();
        assert!(!lpt.is_bound());
    }
}

mod chunked_writes {
    use super::*;

    #[test]
    fn test_130_bytes_in_three_ordered_chunks() {
        let backend = MockBackend::with_adapter();
        let mut lpt = adapter(&backend);
        let payload: Vec<u8> = (0..130u32).map(|i| (i * 7) as u8).collect();

        let outcome = lpt.write_raw(&payload, 0).unwrap();

        assert_eq!(outcome, Outcome::Delivered(bytes::Bytes::new()));
        assert_eq!(write_sizes(&backend.transfers()), vec![64, 64, 2]);
        assert_eq!(backend.written_bytes(), payload);
    }

    #[test]
    fn test_random_payloads_reconstruct() {
        let mut rng = rand::rng();

        for _ in 0..16 {
            let backend = MockBackend::with_adapter();
            let mut lpt = adapter(&backend);
            let len = rng.random_range(1..600);
            let payload: Vec<u8> = (0..len).map(|_| rng.random()).collect();

            assert!(lpt.write_raw(&payload, 0).unwrap().is_delivered());

            let sizes = write_sizes(&backend.transfers());
            assert!(sizes.iter().all(|&s| s <= MAX_TRANSFER_SIZE));
            assert_eq!(backend.written_bytes(), payload);
        }
    }

    #[test]
    fn test_write_raw_then_read() {
        let backend = MockBackend::with_adapter();
        let mut lpt = adapter(&backend);
        backend.queue_read([1, 2, 3]);

        let response = lpt.write_raw(&[0x18, 0x18, 0x18], 3).unwrap();

        assert_eq!(&response.delivered().unwrap()[..], &[1, 2, 3]);
    }

    #[test]
    fn test_write_many_count_pattern() {
        let backend = MockBackend::with_adapter();
        let mut lpt = adapter(&backend);

        let outcome = lpt.write_many((0..=255u8).map(|i| (0, i))).unwrap();

        assert!(outcome.is_delivered());
        assert_eq!(write_sizes(&backend.transfers()), vec![64; 8]);
        let written = backend.written_bytes();
        assert_eq!(written.len(), 512);
        assert!(written.chunks(2).enumerate().all(|(i, pair)| pair == [0, i as u8]));
    }

    #[test]
    fn test_failed_chunk_is_retried_in_place() {
        let backend = MockBackend::with_adapter();
        let mut lpt = adapter(&backend);
        let payload = vec![0xaa; 100];
        backend.fail_next_transfers([rusb::Error::Io]);

        assert!(lpt.write_raw(&payload, 0).unwrap().is_delivered());
        assert_eq!(write_sizes(&backend.transfers()), vec![64, 36]);
    }
}

mod session_lifecycle {
    use super::*;

    #[test]
    fn test_reset_with_device_gone_counts_as_success() {
        let backend = MockBackend::with_adapter();
        let mut lpt = adapter(&backend);
        let before = backend.state().enumerations;
        backend.fail_next_reset(rusb::Error::NotFound);

        assert_eq!(lpt.reset().unwrap(), Outcome::Delivered(()));
        assert!(lpt.is_bound());
        assert_eq!(backend.state().resets, 1);
        assert_eq!(backend.state().enumerations, before + 1);

        // Rebound to the re-enumerated device
        assert!(lpt.write_one(0u8, 1).unwrap().is_delivered());
    }

    #[test]
    fn test_failed_reset_is_retried_once() {
        let backend = MockBackend::with_adapter();
        let mut lpt = adapter(&backend);
        backend.fail_next_reset(rusb::Error::Pipe);

        assert_eq!(lpt.reset().unwrap(), Outcome::Delivered(()));
        assert_eq!(backend.state().resets, 2);
        assert!(lpt.is_bound());
    }

    #[test]
    fn test_close_twice() {
        let backend = MockBackend::with_adapter();
        let mut lpt = adapter(&backend);
        lpt.write_one(0u8, 1).unwrap();

        lpt.close();
        lpt.close();

        let state = backend.state();
        assert_eq!(state.claims, state.releases);
    }

    #[test]
    fn test_drop_releases_claim() {
        let backend = MockBackend::with_adapter();
        {
            let mut lpt = adapter(&backend);
            lpt.write_one(0u8, 1).unwrap();
        }
        let state = backend.state();
        assert_eq!(state.claims, state.releases);
    }
}
