use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use symphony_control_lib::config::ControllerConfig;
use symphony_control_lib::control_interface::ControlInterface;
use symphony_control_lib::ControlError;
use tokio::net::UdpSocket;
use tokio::time::{timeout, Instant};

const PROBE: [u8; 4] = [0x00, 0x01, 0x00, 0xf5];

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// A stand-in for the controller's command port on loopback.
async fn fake_controller() -> (UdpSocket, u16) {
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let port = socket.local_addr().unwrap().port();
    (socket, port)
}

async fn recv_datagram(socket: &UdpSocket) -> (Vec<u8>, SocketAddr) {
    let mut buffer = [0; 1024];
    let (len, from) = timeout(Duration::from_secs(5), socket.recv_from(&mut buffer))
        .await
        .expect("no datagram arrived")
        .unwrap();
    (buffer[..len].to_vec(), from)
}

async fn assert_silent(socket: &UdpSocket, wait: Duration) {
    let mut buffer = [0; 1024];
    let result = timeout(wait, socket.recv_from(&mut buffer)).await;
    assert!(result.is_err(), "unexpected datagram received");
}

fn loopback_config(command_port: u16) -> ControllerConfig {
    ControllerConfig {
        command_port,
        ..ControllerConfig::default().with_ip_address(Ipv4Addr::LOCALHOST)
    }
}

fn discovery_config(command_port: u16, discovery_port: u16) -> ControllerConfig {
    ControllerConfig {
        command_port,
        discovery_port,
        discovery_bind_port: 0,
        ..ControllerConfig::default().with_broadcast_address(Ipv4Addr::LOCALHOST)
    }
}

#[tokio::test]
async fn test_intensity_sent_to_configured_address() {
    init_logging();
    let (controller, port) = fake_controller().await;
    let control = ControlInterface::new(loopback_config(port));

    let pending = control.set_intensity(5, 7).unwrap();
    let (payload, _) = recv_datagram(&controller).await;
    assert_eq!(payload, b"inten_5_7\r\n");

    pending.await.unwrap();
}

#[tokio::test]
async fn test_area_and_all_commands_on_the_wire() {
    init_logging();
    let (controller, port) = fake_controller().await;
    let control = ControlInterface::new(ControllerConfig {
        command_delay: Duration::from_millis(20),
        ..loopback_config(port)
    });

    let first = control.set_area(29, true).unwrap();
    let second = control.set_area(1, false).unwrap();
    let third = control.set_all(false);

    assert_eq!(recv_datagram(&controller).await.0, b"area_on 29\r\n");
    assert_eq!(recv_datagram(&controller).await.0, b"area_off 1\r\n");
    assert_eq!(recv_datagram(&controller).await.0, b"all_off\r\n");

    first.await.unwrap();
    second.await.unwrap();
    third.await.unwrap();
}

#[tokio::test]
async fn test_back_to_back_commands_are_spaced_by_delay() {
    init_logging();
    let (controller, port) = fake_controller().await;
    let control = ControlInterface::new(loopback_config(port));

    let first = control.set_all(true);
    let second = control.set_area(3, true).unwrap();

    let (payload, _) = recv_datagram(&controller).await;
    let first_arrival = Instant::now();
    assert_eq!(payload, b"all_on\r\n");

    let (payload, _) = recv_datagram(&controller).await;
    let second_arrival = Instant::now();
    assert_eq!(payload, b"area_on 3\r\n");

    // Allow a little slack for loopback delivery of the first datagram.
    assert!(second_arrival - first_arrival >= Duration::from_millis(450));

    first.await.unwrap();
    second.await.unwrap();
}

#[tokio::test]
async fn test_completions_follow_enqueue_order() {
    init_logging();
    let (_controller, port) = fake_controller().await;
    let control = ControlInterface::new(ControllerConfig {
        command_delay: Duration::from_millis(100),
        ..loopback_config(port)
    });
    let other_handle = control.clone();

    let first = control.set_all(true);
    let second = other_handle.set_intensity(2, 3).unwrap();

    let started = Instant::now();
    let (first_done, second_done) = tokio::join!(
        async {
            first.await.unwrap();
            Instant::now()
        },
        async {
            second.await.unwrap();
            Instant::now()
        }
    );

    assert!(first_done - started >= Duration::from_millis(100));
    // The second delay only starts once the first command has completed.
    assert!(second_done >= first_done + Duration::from_millis(90));
}

#[tokio::test]
async fn test_invalid_parameters_never_transmit() {
    init_logging();
    let (controller, port) = fake_controller().await;
    let control = ControlInterface::new(loopback_config(port));

    for area in [0, 30, 255] {
        let err = control.set_area(area, true).unwrap_err();
        assert!(err.is_invalid_parameter());
        let err = control.set_intensity(area, 5).unwrap_err();
        assert!(matches!(err, ControlError::InvalidArea { .. }));
    }
    for intensity in [0, 11] {
        let err = control.set_intensity(4, intensity).unwrap_err();
        assert!(matches!(err, ControlError::InvalidIntensity { .. }));
    }

    assert_silent(&controller, Duration::from_millis(200)).await;
}

#[tokio::test]
async fn test_dropped_pending_command_is_still_sent() {
    init_logging();
    let (controller, port) = fake_controller().await;
    let control = ControlInterface::new(loopback_config(port));

    drop(control.set_all(false));

    let (payload, _) = recv_datagram(&controller).await;
    assert_eq!(payload, b"all_off\r\n");
}

#[tokio::test]
async fn test_discovery_resolves_address_before_first_command() {
    init_logging();
    let (controller, command_port) = fake_controller().await;
    let responder = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let discovery_port = responder.local_addr().unwrap().port();

    let control = ControlInterface::new(discovery_config(command_port, discovery_port));
    assert_eq!(control.controller_address(), None);

    let pending = control.set_all(true);

    let (probe, prober) = recv_datagram(&responder).await;
    assert_eq!(probe, PROBE);
    // Near misses must not resolve the address.
    for reply in [&b"yes"[..], b"YES\n", b"NO"] {
        responder.send_to(reply, prober).await.unwrap();
    }
    responder.send_to(b"YES", prober).await.unwrap();

    let (payload, _) = recv_datagram(&controller).await;
    assert_eq!(payload, b"all_on\r\n");
    pending.await.unwrap();
    assert_eq!(control.controller_address(), Some(Ipv4Addr::LOCALHOST));

    // The discovered address is reused without another probe.
    let pending = control.set_area(7, false).unwrap();
    let (payload, _) = recv_datagram(&controller).await;
    assert_eq!(payload, b"area_off 7\r\n");
    pending.await.unwrap();
    assert_silent(&responder, Duration::from_millis(200)).await;
}

#[tokio::test]
async fn test_discovery_timeout_fails_command_and_retries_next_time() {
    init_logging();
    let (controller, command_port) = fake_controller().await;
    let responder = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let discovery_port = responder.local_addr().unwrap().port();

    let control = ControlInterface::new(discovery_config(command_port, discovery_port));

    let started = Instant::now();
    let result = control.set_intensity(1, 1).unwrap().await;
    assert!(matches!(result, Err(ControlError::DiscoveryTimeout(_))));
    assert!(started.elapsed() >= Duration::from_millis(1000));
    assert_eq!(control.controller_address(), None);
    assert_silent(&controller, Duration::from_millis(50)).await;

    // Answer every probe from now on, including the one left over from the failed attempt.
    let responder_task = tokio::spawn(async move {
        loop {
            let (probe, prober) = recv_datagram(&responder).await;
            assert_eq!(probe, PROBE);
            responder.send_to(b"YES", prober).await.unwrap();
        }
    });

    let pending = control.set_intensity(1, 1).unwrap();
    let (payload, _) = recv_datagram(&controller).await;
    assert_eq!(payload, b"inten_1_1\r\n");
    pending.await.unwrap();
    assert_eq!(control.controller_address(), Some(Ipv4Addr::LOCALHOST));

    responder_task.abort();
}

#[tokio::test]
async fn test_independent_instances_discover_concurrently() {
    init_logging();
    let (_controller, command_port) = fake_controller().await;
    let responder = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let discovery_port = responder.local_addr().unwrap().port();
    let shared_bind_port = {
        let reserved = std::net::UdpSocket::bind("0.0.0.0:0").unwrap();
        reserved.local_addr().unwrap().port()
    };

    let config = ControllerConfig {
        discovery_bind_port: shared_bind_port,
        discovery_timeout: Duration::from_millis(300),
        ..discovery_config(command_port, discovery_port)
    };
    let first = ControlInterface::new(config.clone());
    let second = ControlInterface::new(config);

    let (first_result, second_result) = tokio::join!(first.set_all(true), second.set_all(false));
    assert!(matches!(first_result, Err(ControlError::DiscoveryTimeout(_))));
    assert!(matches!(second_result, Err(ControlError::DiscoveryTimeout(_))));

    // Both instances broadcast from the same local port.
    for _ in 0..2 {
        let (probe, prober) = recv_datagram(&responder).await;
        assert_eq!(probe, PROBE);
        assert_eq!(prober.port(), shared_bind_port);
    }
}

#[tokio::test]
async fn test_discovery_bind_failure_fails_command_without_delay() {
    init_logging();
    let (controller, command_port) = fake_controller().await;
    let responder = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let discovery_port = responder.local_addr().unwrap().port();
    // Held without address reuse, so the discovery socket cannot share it.
    let holder = UdpSocket::bind("0.0.0.0:0").await.unwrap();

    let control = ControlInterface::new(ControllerConfig {
        discovery_bind_port: holder.local_addr().unwrap().port(),
        ..discovery_config(command_port, discovery_port)
    });

    let started = Instant::now();
    let result = control.set_all(true).await;
    assert!(matches!(result, Err(ControlError::DiscoverySocket(_))));
    assert!(started.elapsed() < Duration::from_millis(500));
    assert_eq!(control.controller_address(), None);

    assert_silent(&responder, Duration::from_millis(100)).await;
    assert_silent(&controller, Duration::from_millis(100)).await;
}

#[tokio::test]
async fn test_failed_send_still_waits_command_delay() {
    init_logging();
    let (_controller, port) = fake_controller().await;
    // The command socket has no broadcast permission, so this send is refused.
    let control = ControlInterface::new(ControllerConfig {
        command_port: port,
        ..ControllerConfig::default().with_ip_address(Ipv4Addr::BROADCAST)
    });

    let started = Instant::now();
    let result = control.set_all(true).await;
    assert!(matches!(result, Err(ControlError::Send(_))));
    assert!(started.elapsed() >= Duration::from_millis(500));
}
