mod common;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use common::{SimConfig, Simulator, STAMP};
use expander_device::{
    configure_magnetic_encoder, configure_pwm, CancellationToken, Device, DeviceConfig,
    ExpanderError, PwmSettings,
};
use expander_frame::{Frame, MessageKind, PayloadType};
use expander_registers::{
    decode_typed, names, DigitalOutputs, EncoderSampleRate, OpticalFlowDelta, PwmChannels,
    RegisterError, RegisterMap, RegisterValue,
};

async fn connect(config: SimConfig) -> (Device, Simulator) {
    connect_with(config, DeviceConfig::default()).await
}

async fn connect_with(config: SimConfig, device_config: DeviceConfig) -> (Device, Simulator) {
    let (sim, host) = Simulator::spawn(config);
    let device = Device::connect(host, device_config)
        .await
        .expect("device should connect");
    (device, sim)
}

#[tokio::test]
async fn connect_verifies_identity() {
    let (device, sim) = connect(SimConfig::default()).await;
    assert_eq!(device.who_am_i(), 1108);

    let requests = sim.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].kind, MessageKind::Read);
    assert_eq!(requests[0].address, 0);
    assert_eq!(requests[0].payload_type, PayloadType::U16);
}

#[tokio::test]
async fn identity_mismatch_yields_no_handle() {
    let (_sim, host) = Simulator::spawn(SimConfig {
        who_am_i: 1234,
        ..SimConfig::default()
    });
    let err = Device::connect(host, DeviceConfig::default())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ExpanderError::IdentityMismatch {
            expected: 1108,
            actual: 1234
        }
    ));
}

#[tokio::test]
async fn typed_write_then_read() {
    let (device, _sim) = connect(SimConfig::default()).await;

    let outputs = DigitalOutputs::OUT0 | DigitalOutputs::OUT3;
    device.write(names::OUTPUT_SET, outputs).await.unwrap();
    let read: DigitalOutputs = device.read(names::OUTPUT_SET).await.unwrap();
    assert_eq!(read, outputs);

    device.write("Pwm1Frequency", 123.5f32).await.unwrap();
    let frequency: f32 = device.read("Pwm1Frequency").await.unwrap();
    assert_eq!(frequency, 123.5);
}

#[tokio::test]
async fn timestamped_read() {
    let (device, _sim) = connect(SimConfig::default()).await;

    device.write(names::OUTPUT_STATE, DigitalOutputs::OUT9).await.unwrap();
    let stamped = device
        .read_timestamped::<DigitalOutputs>(names::OUTPUT_STATE)
        .await
        .unwrap();
    assert_eq!(stamped.value, DigitalOutputs::OUT9);
    assert!((stamped.seconds - STAMP.as_secs_f64()).abs() < 1e-9);
}

#[tokio::test]
async fn access_checks_happen_before_the_wire() {
    let (device, sim) = connect(SimConfig::default()).await;

    let err = device.write(names::WHO_AM_I, 1u16).await.unwrap_err();
    assert!(matches!(
        err,
        ExpanderError::Register(RegisterError::AccessDenied { operation: "write", .. })
    ));

    let err = device
        .read_timestamped::<u8>(names::ASSEMBLY_VERSION)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ExpanderError::Register(RegisterError::AccessDenied { .. })
    ));

    let err = device.read::<u8>("Pwm9Frequency").await.unwrap_err();
    assert!(matches!(
        err,
        ExpanderError::Register(RegisterError::UnknownRegister(_))
    ));

    assert_eq!(sim.requests().len(), 1);
}

#[tokio::test]
async fn error_reply_becomes_device_error() {
    let (device, _sim) = connect(SimConfig {
        reject: HashSet::from([87]),
        ..SimConfig::default()
    })
    .await;

    let err = device
        .write(
            names::EXPANSION_BOARD,
            expander_registers::ExpansionBoardType::ServoMotor,
        )
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ExpanderError::Device {
            address: 87,
            code: 0x0A
        }
    ));
}

#[tokio::test]
async fn info_reads_versions() {
    let (device, _sim) = connect(SimConfig::default()).await;
    let info = device.info().await.unwrap();
    assert_eq!(info.who_am_i, 1108);
    assert_eq!(info.hardware_version.to_string(), "1.0");
    assert_eq!(info.core_version.to_string(), "1.12");
    assert_eq!(info.firmware_version.to_string(), "0.3");
}

#[tokio::test]
async fn pwm_sequence_reaches_the_wire_in_order() {
    let (device, sim) = connect(SimConfig::default()).await;

    let writes = configure_pwm(&PwmSettings {
        channels: PwmChannels::PWM0 | PwmChannels::PWM2,
        frequency: 50.0,
        duty_cycle: 25.0,
        pulse_count: 0,
    })
    .unwrap();
    device.apply(&writes, None).await.unwrap();

    assert_eq!(
        sim.addresses_after_identity(),
        vec![42, 43, 47, 48, 49, 58, 59, 63, 64, 65]
    );
    assert!(sim
        .requests()
        .iter()
        .skip(1)
        .all(|frame| frame.kind == MessageKind::Write));

    let frequency: f32 = device.read("Pwm2Frequency").await.unwrap();
    assert_eq!(frequency, 50.0);
}

#[tokio::test]
async fn encoder_sequence() {
    let (device, sim) = connect(SimConfig::default()).await;

    let writes = configure_magnetic_encoder(EncoderSampleRate::Rate1000Hz).unwrap();
    device.apply(&writes, None).await.unwrap();

    let requests = sim.requests();
    assert_eq!(sim.addresses_after_identity(), vec![87, 89]);
    assert_eq!(&requests[1].payload[..], &[2]);
    assert_eq!(&requests[2].payload[..], &[5]);
}

#[tokio::test]
async fn concurrent_callers_are_serialised() {
    let (device, sim) = connect(SimConfig {
        processing: Duration::from_millis(5),
        ..SimConfig::default()
    })
    .await;
    let device = Arc::new(device);

    let mut tasks = Vec::new();
    for channel in 0..10u8 {
        let device = Arc::clone(&device);
        tasks.push(tokio::spawn(async move {
            let name = format!("Out{channel}PulseWidth");
            device.write(&name, u16::from(channel) * 100).await.unwrap();
            device.read::<u16>(&name).await.unwrap()
        }));
    }
    for (channel, task) in tasks.into_iter().enumerate() {
        assert_eq!(task.await.unwrap(), channel as u16 * 100);
    }

    assert_eq!(sim.violations(), 0);
    assert_eq!(sim.requests().len(), 1 + 20);
}

#[tokio::test]
async fn cancelled_read_does_not_leak_its_reply() {
    let (device, sim) = connect(SimConfig {
        hold_once: HashSet::from([38]),
        ..SimConfig::default()
    })
    .await;
    let device = Arc::new(device);
    let map = RegisterMap::output_expander();
    let state = map.resolve(names::OUTPUT_STATE).unwrap();

    let token = CancellationToken::new();
    let pending = {
        let device = Arc::clone(&device);
        let token = token.clone();
        tokio::spawn(async move {
            device
                .read_register::<DigitalOutputs>(state, Some(&token))
                .await
        })
    };
    // Let the read reach the wire before cancelling.
    while sim.requests().len() < 2 {
        tokio::task::yield_now().await;
    }
    token.cancel();
    let err = pending.await.unwrap().unwrap_err();
    assert!(matches!(err, ExpanderError::Cancelled { address: 38 }));

    // The simulator now sends the stale read reply right before the write
    // acknowledgement, and that must not satisfy the next read.
    device.write(names::OUTPUT_STATE, DigitalOutputs::OUT2).await.unwrap();
    let value: DigitalOutputs = device.read(names::OUTPUT_STATE).await.unwrap();
    assert_eq!(value, DigitalOutputs::OUT2);
}

#[tokio::test]
async fn timed_out_read_discards_late_reply_for_same_address() {
    let config = DeviceConfig::default().with_reply_timeout(Duration::from_millis(50));
    let (device, _sim) = connect_with(
        SimConfig {
            hold_once: HashSet::from([77]),
            ..SimConfig::default()
        },
        config,
    )
    .await;

    device.write("Out0PulseWidth", 7u16).await.unwrap_err();

    // The held write ack arrives ahead of this read's reply; it is the
    // orphan's and gets dropped, and the read still completes.
    let value: u16 = device.read("Out0PulseWidth").await.unwrap();
    assert_eq!(value, 7);
}

#[tokio::test]
async fn already_cancelled_token_fails_fast() {
    let (device, sim) = connect(SimConfig::default()).await;
    let token = CancellationToken::new();
    token.cancel();

    let descriptor = RegisterMap::output_expander()
        .resolve(names::ASSEMBLY_VERSION)
        .unwrap();
    let err = device
        .read_register::<u8>(descriptor, Some(&token))
        .await
        .unwrap_err();
    assert!(matches!(err, ExpanderError::Cancelled { address: 3 }));
    assert_eq!(sim.requests().len(), 1);
}

#[tokio::test]
async fn events_reach_subscribers() {
    let (device, sim) = connect(SimConfig::default()).await;
    let mut events = device.subscribe_events();

    let descriptor = RegisterMap::output_expander()
        .resolve(names::OPTICAL_FLOW)
        .unwrap();
    let event = Frame::new(
        MessageKind::Event,
        descriptor.address,
        PayloadType::S16,
        RegisterValue::Int16Pair(-4, 9).to_payload(),
    )
    .with_timestamp(STAMP);
    sim.emit(event).await;

    let received = events.recv().await.unwrap();
    let delta: OpticalFlowDelta = decode_typed(descriptor, &received).unwrap();
    assert_eq!(delta, OpticalFlowDelta { dx: -4, dy: 9 });
}

#[tokio::test]
async fn disconnect_fails_requests() {
    let (device, sim) = connect(SimConfig::default()).await;
    sim.shutdown();

    let err = device.read::<u8>(names::ASSEMBLY_VERSION).await.unwrap_err();
    assert!(matches!(err, ExpanderError::Disconnected));
}
