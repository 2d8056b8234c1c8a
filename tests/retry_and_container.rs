//! Integration coverage for retry orchestration and the container format,
//! driven through the public facade (spec §8 scenarios 4, 5, 7).

use std::cell::Cell;
use std::io::Cursor;
use std::sync::Arc;

use bittrack::{
    BackupCoordinator, BackupCoordinatorConfig, BitmapEngine, Container, ContainerHeader,
    EngineConfig, EventInterceptor, InterceptorConfig,
};

fn new_coordinator(retry_max: u32, retry_interval_secs: u64) -> BackupCoordinator {
    let engine = Arc::new(BitmapEngine::new(EngineConfig::default()));
    let interceptor = Arc::new(EventInterceptor::new(Arc::clone(&engine), InterceptorConfig::default()));
    BackupCoordinator::new(
        engine,
        interceptor,
        BackupCoordinatorConfig {
            retry_max,
            retry_interval_secs,
            ..BackupCoordinatorConfig::default()
        },
    )
}

#[test]
fn retry_exhaustion_matches_scenario_four() {
    let coordinator = new_coordinator(3, 0);
    let calls = Cell::new(0u32);

    let (result, ctx) = coordinator.execute_with_retry(|| {
        calls.set(calls.get() + 1);
        Err::<(), _>(bittrack::Error::Network("down".into()))
    });

    assert_eq!(calls.get(), 4);
    assert!(matches!(result, Err(bittrack::Error::RetryExhausted { attempts: 4 })));
    assert_eq!(ctx.state, bittrack::RetryState::Failed);
    assert!(coordinator.get_last_error().is_some());
}

#[test]
fn non_retryable_short_circuit_matches_scenario_five() {
    let coordinator = new_coordinator(3, 0);
    let calls = Cell::new(0u32);

    let (result, _ctx) = coordinator.execute_with_retry(|| {
        calls.set(calls.get() + 1);
        Err::<(), _>(bittrack::Error::InvalidParam("bad arg".into()))
    });

    assert_eq!(calls.get(), 1);
    assert!(matches!(result, Err(bittrack::Error::InvalidParam(_))));
}

#[test]
fn container_round_trip_matches_scenario_seven() {
    let mut container = Container::new(ContainerHeader::new("db1", 0, 0, 0));
    container.push_block(1, 0, b"aa".to_vec());
    container.push_block(2, 0, b"bbbb".to_vec());

    let mut bytes = Vec::new();
    container.write_to(&mut bytes).unwrap();

    let read_back = Container::read_from(&mut Cursor::new(bytes)).unwrap();
    assert_eq!(read_back.header.obj_name, "db1");
    assert_eq!(read_back.blocks.len(), 2);
    assert_eq!(read_back.blocks[0].msg_body, b"aa");
    assert_eq!(read_back.blocks[1].msg_body, b"bbbb");
}
