mod common;

use std::time::{Duration, Instant};

use tokio::io::DuplexStream;

use common::{fast_config, settle, sigfox_replies, spawn_modem};
use sigfox_modem_lib::serial::{self, ChannelEvent, SerialError};
use sigfox_modem_lib::{DriverConfig, ModemDriver, ModemError};

fn delayed_modem(delay_ms: u64, config: DriverConfig) -> ModemDriver {
    let (stream, _received) = spawn_modem(sigfox_replies("1,5"));
    ModemDriver::connect("delayed", config, async move {
        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        Ok::<_, SerialError>(stream)
    })
}

#[tokio::test]
async fn test_concurrent_waiters_resolve_when_port_opens() {
    let driver = delayed_modem(100, fast_config());
    let start = Instant::now();

    let (a, b, c) = tokio::join!(driver.wait_port_ready(), driver.wait_port_ready(), driver.wait_port_ready());
    assert!(a.is_ok() && b.is_ok() && c.is_ok());
    assert!(start.elapsed() >= Duration::from_millis(90));
}

#[tokio::test]
async fn test_already_open_port_resolves_immediately() {
    let (stream, _received) = spawn_modem(sigfox_replies("1,5"));
    let driver = ModemDriver::from_stream("mock", fast_config(), stream);
    driver.wait_port_ready().await.expect("first wait");

    let start = Instant::now();
    driver.wait_port_ready().await.expect("second wait");
    assert!(start.elapsed() < Duration::from_millis(50));
}

#[tokio::test]
async fn test_port_that_never_opens_times_out() {
    let config = DriverConfig { ready_timeout_ms: 100, ..fast_config() };
    let driver = ModemDriver::connect("never", config, std::future::pending::<serial::Result<DuplexStream>>());

    let start = Instant::now();
    let err = driver.wait_port_ready().await.expect_err("timeout");
    assert!(matches!(err, ModemError::Serial(SerialError::ReadyTimeout)));
    assert!(err.is_timeout());
    assert_eq!(err.to_string(), "Serial communication error: port ready timeout");
    assert!(start.elapsed() < Duration::from_secs(1));
}

#[tokio::test]
async fn test_late_open_after_failed_wait_is_harmless() {
    let config = DriverConfig { ready_timeout_ms: 50, ..fast_config() };
    let driver = delayed_modem(150, config);

    assert!(driver.wait_port_ready().await.is_err());
    tokio::time::sleep(Duration::from_millis(150)).await;
    driver.wait_port_ready().await.expect("opened later");
    assert_eq!(driver.check_module_is_alive().await.expect("alive"), "OK");
}

#[tokio::test]
async fn test_empty_port_name_is_rejected() {
    match ModemDriver::open("", DriverConfig::default()) {
        Err(ModemError::Validation(msg)) => assert_eq!(msg, "Portname is required!"),
        Err(other) => panic!("unexpected error {:?}", other),
        Ok(_) => panic!("driver created without a port name"),
    }
}

#[tokio::test]
async fn test_close_emits_closed_event() {
    let (stream, _received) = spawn_modem(sigfox_replies("1,5"));
    let driver = ModemDriver::from_stream("mock", fast_config(), stream);
    let mut events = driver.subscribe_events();

    driver.wait_port_ready().await.expect("ready");
    assert_eq!(events.recv().await.expect("opened"), ChannelEvent::Opened);

    driver.close().await.expect("close");
    assert_eq!(events.recv().await.expect("closed"), ChannelEvent::Closed);
}

#[tokio::test]
async fn test_unplugged_port_is_no_longer_open() {
    let config = DriverConfig { ready_timeout_ms: 50, ..fast_config() };
    let (host, device) = tokio::io::duplex(256);
    let driver = ModemDriver::from_stream("mock", config, host);
    let mut events = driver.subscribe_events();

    driver.wait_port_ready().await.expect("ready");
    assert!(driver.is_open());
    assert_eq!(events.recv().await.expect("opened"), ChannelEvent::Opened);

    drop(device);
    let event = tokio::time::timeout(Duration::from_secs(1), events.recv())
        .await
        .expect("event in time")
        .expect("event");
    assert_eq!(event, ChannelEvent::Closed);
    settle().await;

    assert!(!driver.is_open());
    let err = driver.wait_port_ready().await.expect_err("not ready");
    assert!(matches!(err, ModemError::Serial(SerialError::ReadyTimeout)));
}
