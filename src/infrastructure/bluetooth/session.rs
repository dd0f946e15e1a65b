//! Session driver: the scan → connect → read → listen state machine.
//!
//! Exactly one session runs at a time. The UI issues [`SessionCommand`]s
//! into the driver and the driver pushes [`AppEvent`]s back; it never
//! calls into UI internals. Notifications arrive over a single-consumer
//! channel, so every report is fully handled before the next one is
//! taken.

use super::client::{BleCentral, BleConnection, BleError, NotificationStream};
use super::protocol::{self, CharacteristicId};
use crate::domain::models::{
    AppEvent, DeviceInfo, MessageSeverity, SessionCommand, SessionState, StatusMessage,
};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

/// Everything that can end or degrade a session. All of these surface as
/// a single console line; none of them crash the driver, and only
/// `MalformedPacket` leaves the session running.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Pokeball not found. Make sure it is powered on.")]
    DeviceNotFound,
    #[error("scan failed: {0}")]
    Scan(#[source] BleError),
    #[error("failed to connect: {0}")]
    Connect(#[source] BleError),
    #[error("failed to read characteristic {handle}: {reason}")]
    CharacteristicRead { handle: u16, reason: String },
    #[error("failed to subscribe to input reports: {0}")]
    Subscribe(#[source] BleError),
    #[error("malformed input report: {0}")]
    MalformedPacket(#[from] protocol::PacketError),
    #[error("connection lost while listening")]
    UnexpectedDisconnect,
}

enum ListenEnd {
    Stopped,
    Disconnected,
}

pub struct SessionDriver<C: BleCentral> {
    central: C,
    events: mpsc::UnboundedSender<AppEvent>,
}

impl<C: BleCentral> SessionDriver<C> {
    pub fn new(central: C, events: mpsc::UnboundedSender<AppEvent>) -> Self {
        Self { central, events }
    }

    /// Pump commands until the UI goes away. `Stop` while idle is a no-op.
    pub async fn run(mut self, mut commands: mpsc::UnboundedReceiver<SessionCommand>) {
        while let Some(command) = commands.recv().await {
            match command {
                SessionCommand::Start => self.run_session(&mut commands).await,
                SessionCommand::Stop => {}
            }
        }
    }

    async fn run_session(&mut self, commands: &mut mpsc::UnboundedReceiver<SessionCommand>) {
        self.set_state(SessionState::Scanning);
        self.log(MessageSeverity::Info, "Scanning for devices...".into());

        let device = match self
            .central
            .find_by_name(protocol::DEVICE_NAME, protocol::SCAN_TIMEOUT)
            .await
        {
            Ok(Some(device)) => device,
            Ok(None) => {
                self.report(&SessionError::DeviceNotFound);
                self.set_state(SessionState::Idle);
                return;
            }
            Err(e) => {
                self.report(&SessionError::Scan(e));
                self.set_state(SessionState::Error);
                return;
            }
        };

        self.log(MessageSeverity::Info, "Found device. Connecting...".into());
        self.set_state(SessionState::Connecting);

        let mut link = match self.central.connect(device).await {
            Ok(link) => link,
            Err(e) => {
                self.report(&SessionError::Connect(e));
                self.set_state(SessionState::Error);
                return;
            }
        };
        self.log(MessageSeverity::Success, "Connected to Pokeball.".into());

        let info = match read_device_info(&link).await {
            Ok(info) => info,
            Err(e) => {
                self.report(&e);
                let _ = link.disconnect().await;
                self.set_state(SessionState::Error);
                return;
            }
        };
        self.log(
            MessageSeverity::Info,
            format!("Manufacturer: {}", info.manufacturer),
        );
        self.log(
            MessageSeverity::Info,
            format!("Battery level: {}%", info.battery_percent),
        );
        self.log(
            MessageSeverity::Info,
            format!("Software revision: {}", info.software_revision),
        );
        self.set_state(SessionState::Connected(info));

        let mut reports = match link.subscribe(protocol::INPUT_REPORT).await {
            Ok(reports) => reports,
            Err(e) => {
                self.report(&SessionError::Subscribe(e));
                let _ = link.disconnect().await;
                self.set_state(SessionState::Error);
                return;
            }
        };
        self.log(MessageSeverity::Info, "Listening to input data...".into());
        self.set_state(SessionState::Listening);

        let end = self.listen(commands, &mut reports).await;

        // Cleanup runs on every way out of the listen loop.
        if let Err(e) = link.unsubscribe(protocol::INPUT_REPORT).await {
            warn!("unsubscribe failed: {e}");
        }
        if let Err(e) = link.disconnect().await {
            warn!("disconnect failed: {e}");
        }

        match end {
            ListenEnd::Stopped => {
                self.log(MessageSeverity::Info, "Stopped listening.".into());
                self.set_state(SessionState::Idle);
            }
            ListenEnd::Disconnected => {
                self.report(&SessionError::UnexpectedDisconnect);
                self.set_state(SessionState::Error);
            }
        }
    }

    /// Idle on the subscription until the UI stops the session (or goes
    /// away entirely) or the notification channel dies under us.
    async fn listen(
        &mut self,
        commands: &mut mpsc::UnboundedReceiver<SessionCommand>,
        reports: &mut NotificationStream,
    ) -> ListenEnd {
        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(SessionCommand::Stop) | None => return ListenEnd::Stopped,
                    // Already running; the UI keeps the button disabled.
                    Some(SessionCommand::Start) => {}
                },
                report = reports.recv() => match report {
                    Some(data) => self.handle_report(&data),
                    None => return ListenEnd::Disconnected,
                },
            }
        }
    }

    /// A bad packet gets one warning line and listening continues.
    fn handle_report(&mut self, data: &[u8]) {
        match protocol::decode_input_report(data) {
            Ok(sample) => self.log(MessageSeverity::Info, sample.console_line()),
            Err(e) => self.report(&SessionError::MalformedPacket(e)),
        }
    }

    fn report(&mut self, error: &SessionError) {
        let severity = match error {
            SessionError::DeviceNotFound | SessionError::MalformedPacket(_) => {
                MessageSeverity::Warning
            }
            _ => MessageSeverity::Error,
        };
        self.log(severity, error.to_string());
    }

    fn log(&mut self, severity: MessageSeverity, message: String) {
        match severity {
            MessageSeverity::Info | MessageSeverity::Success => info!("{message}"),
            MessageSeverity::Warning => warn!("{message}"),
            MessageSeverity::Error => error!("{message}"),
        }
        let _ = self
            .events
            .send(AppEvent::Log(StatusMessage { message, severity }));
    }

    fn set_state(&mut self, state: SessionState) {
        let _ = self.events.send(AppEvent::State(state));
    }
}

async fn read_device_info<L: BleConnection>(link: &L) -> Result<DeviceInfo, SessionError> {
    let manufacturer = read_string(link, protocol::MANUFACTURER_NAME).await?;
    let software_revision = read_string(link, protocol::SOFTWARE_REVISION).await?;

    let battery = read_value(link, protocol::BATTERY_LEVEL).await?;
    let battery_percent = match battery.as_slice() {
        [level] => *level,
        other => {
            return Err(SessionError::CharacteristicRead {
                handle: protocol::BATTERY_LEVEL.handle,
                reason: format!("unexpected battery payload {other:02x?}"),
            })
        }
    };

    Ok(DeviceInfo {
        manufacturer,
        software_revision,
        battery_percent,
    })
}

async fn read_value<L: BleConnection>(
    link: &L,
    id: CharacteristicId,
) -> Result<Vec<u8>, SessionError> {
    link.read_characteristic(id)
        .await
        .map_err(|e| SessionError::CharacteristicRead {
            handle: id.handle,
            reason: e.to_string(),
        })
}

async fn read_string<L: BleConnection>(
    link: &L,
    id: CharacteristicId,
) -> Result<String, SessionError> {
    let value = read_value(link, id).await?;
    String::from_utf8(value).map_err(|_| SessionError::CharacteristicRead {
        handle: id.handle,
        reason: "value is not valid UTF-8".into(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    #[derive(Debug)]
    struct FakeDevice;

    /// Scripted stand-in for the BLE stack. Records every call it sees.
    #[derive(Clone, Default)]
    struct FakeCentral {
        present: bool,
        fail_reads: bool,
        keep_open: bool,
        reports: Vec<Vec<u8>>,
        calls: Arc<Mutex<Vec<String>>>,
        feed: Arc<Mutex<Option<mpsc::UnboundedSender<Vec<u8>>>>>,
    }

    impl FakeCentral {
        fn push(&self, call: impl Into<String>) {
            self.calls.lock().unwrap().push(call.into());
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl BleCentral for FakeCentral {
        type Device = FakeDevice;
        type Connection = FakeLink;

        async fn find_by_name(
            &self,
            _name: &str,
            _timeout: Duration,
        ) -> Result<Option<FakeDevice>, BleError> {
            self.push("scan");
            Ok(self.present.then_some(FakeDevice))
        }

        async fn connect(&self, _device: FakeDevice) -> Result<FakeLink, BleError> {
            self.push("connect");
            Ok(FakeLink {
                central: self.clone(),
            })
        }
    }

    struct FakeLink {
        central: FakeCentral,
    }

    impl BleConnection for FakeLink {
        async fn read_characteristic(&self, id: CharacteristicId) -> Result<Vec<u8>, BleError> {
            self.central.push(format!("read {}", id.handle));
            if self.central.fail_reads {
                return Err(BleError::NoAdapter);
            }
            Ok(match id.handle {
                33 => vec![87],
                49 => b"Nintendo".to_vec(),
                51 => b"1.0.0".to_vec(),
                _ => Vec::new(),
            })
        }

        async fn subscribe(
            &mut self,
            _id: CharacteristicId,
        ) -> Result<NotificationStream, BleError> {
            self.central.push("subscribe");
            let (tx, rx) = mpsc::unbounded_channel();
            for report in &self.central.reports {
                let _ = tx.send(report.clone());
            }
            if self.central.keep_open {
                // Parking the sender keeps the stream alive after the
                // scripted reports drain.
                *self.central.feed.lock().unwrap() = Some(tx);
            }
            Ok(rx)
        }

        async fn unsubscribe(&mut self, _id: CharacteristicId) -> Result<(), BleError> {
            self.central.push("unsubscribe");
            Ok(())
        }

        async fn disconnect(&mut self) -> Result<(), BleError> {
            self.central.push("disconnect");
            Ok(())
        }
    }

    fn report_packet(tick: u8, buttons: u8) -> Vec<u8> {
        let mut packet = vec![0u8; protocol::INPUT_REPORT_LEN];
        packet[0] = tick;
        packet[1] = buttons;
        packet
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<AppEvent>) -> Vec<AppEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    fn log_lines(events: &[AppEvent]) -> Vec<String> {
        events
            .iter()
            .filter_map(|e| match e {
                AppEvent::Log(m) => Some(m.message.clone()),
                _ => None,
            })
            .collect()
    }

    fn states(events: &[AppEvent]) -> Vec<SessionState> {
        events
            .iter()
            .filter_map(|e| match e {
                AppEvent::State(s) => Some(s.clone()),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn failed_scan_logs_once_and_reenables_start() {
        let central = FakeCentral::default();
        let (event_tx, mut event_rx) = mpsc::unbounded_channel();
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();

        cmd_tx.send(SessionCommand::Start).unwrap();
        drop(cmd_tx);
        SessionDriver::new(central.clone(), event_tx).run(cmd_rx).await;

        let events = drain(&mut event_rx);
        let not_found = log_lines(&events)
            .iter()
            .filter(|line| line.contains("not found"))
            .count();
        assert_eq!(not_found, 1);
        assert_eq!(
            states(&events),
            vec![SessionState::Scanning, SessionState::Idle]
        );
        assert!(SessionState::Idle.allows_start());
        assert_eq!(central.calls(), vec!["scan"]);
    }

    #[tokio::test]
    async fn read_failure_disconnects_without_subscribing() {
        let central = FakeCentral {
            present: true,
            fail_reads: true,
            ..Default::default()
        };
        let (event_tx, mut event_rx) = mpsc::unbounded_channel();
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();

        cmd_tx.send(SessionCommand::Start).unwrap();
        drop(cmd_tx);
        SessionDriver::new(central.clone(), event_tx).run(cmd_rx).await;

        assert_eq!(central.calls(), vec!["scan", "connect", "read 49", "disconnect"]);

        let events = drain(&mut event_rx);
        assert_eq!(
            states(&events),
            vec![
                SessionState::Scanning,
                SessionState::Connecting,
                SessionState::Error
            ]
        );
        assert!(SessionState::Error.allows_start());
        assert!(log_lines(&events)
            .iter()
            .any(|line| line.contains("failed to read characteristic 49")));
    }

    #[tokio::test]
    async fn notifications_are_logged_in_arrival_order() {
        let packets = vec![
            report_packet(1, 0b01),
            report_packet(2, 0b10),
            report_packet(3, 0b00),
        ];
        let central = FakeCentral {
            present: true,
            keep_open: true,
            reports: packets.clone(),
            ..Default::default()
        };
        let (event_tx, mut event_rx) = mpsc::unbounded_channel();
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();

        let driver = SessionDriver::new(central.clone(), event_tx).run(cmd_rx);
        let script = async {
            cmd_tx.send(SessionCommand::Start).unwrap();
            let mut lines = Vec::new();
            while lines.len() < 3 {
                match event_rx.recv().await.expect("driver hung up") {
                    AppEvent::Log(m) if m.message.starts_with("t:") => lines.push(m.message),
                    _ => {}
                }
            }
            cmd_tx.send(SessionCommand::Stop).unwrap();
            drop(cmd_tx);
            lines
        };
        let ((), lines) = tokio::join!(driver, script);

        let expected: Vec<String> = packets
            .iter()
            .map(|p| protocol::decode_input_report(p).unwrap().console_line())
            .collect();
        assert_eq!(lines, expected);

        let events = drain(&mut event_rx);
        assert!(log_lines(&events).iter().any(|l| l == "Stopped listening."));
        assert_eq!(states(&events).last(), Some(&SessionState::Idle));
        let calls = central.calls();
        assert!(calls.ends_with(&["unsubscribe".to_string(), "disconnect".to_string()]));
    }

    #[tokio::test]
    async fn malformed_packet_does_not_end_the_session() {
        let packets = vec![report_packet(1, 0), vec![0u8; 4], report_packet(2, 0)];
        let central = FakeCentral {
            present: true,
            keep_open: true,
            reports: packets,
            ..Default::default()
        };
        let (event_tx, mut event_rx) = mpsc::unbounded_channel();
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();

        let driver = SessionDriver::new(central, event_tx).run(cmd_rx);
        let script = async {
            let mut samples = Vec::new();
            let mut warnings = Vec::new();
            cmd_tx.send(SessionCommand::Start).unwrap();
            while samples.len() < 2 || warnings.is_empty() {
                match event_rx.recv().await.expect("driver hung up") {
                    AppEvent::Log(m) if m.message.starts_with("t:") => samples.push(m.message),
                    AppEvent::Log(m) if m.severity == MessageSeverity::Warning => {
                        warnings.push(m.message)
                    }
                    _ => {}
                }
            }
            cmd_tx.send(SessionCommand::Stop).unwrap();
            drop(cmd_tx);
            (samples, warnings)
        };
        let ((), (samples, warnings)) = tokio::join!(driver, script);

        // The short packet is reported but both good packets around it
        // still decode.
        assert_eq!(samples.len(), 2);
        assert!(warnings[0].contains("too short"));
        let events = drain(&mut event_rx);
        assert_eq!(states(&events).last(), Some(&SessionState::Idle));
    }

    #[tokio::test]
    async fn closed_notification_channel_is_an_unexpected_disconnect() {
        let central = FakeCentral {
            present: true,
            reports: vec![report_packet(7, 0)],
            ..Default::default()
        };
        let (event_tx, mut event_rx) = mpsc::unbounded_channel();
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();

        let driver = SessionDriver::new(central.clone(), event_tx).run(cmd_rx);
        let script = async {
            cmd_tx.send(SessionCommand::Start).unwrap();
            let mut events = Vec::new();
            loop {
                let event = event_rx.recv().await.expect("driver hung up");
                let done = matches!(event, AppEvent::State(SessionState::Error));
                events.push(event);
                if done {
                    break;
                }
            }
            drop(cmd_tx);
            events
        };
        let ((), events) = tokio::join!(driver, script);

        let lines = log_lines(&events);
        assert!(lines.iter().any(|l| l.starts_with("t:  7")));
        assert!(lines.iter().any(|l| l.contains("connection lost")));
        let calls = central.calls();
        assert!(calls.ends_with(&["unsubscribe".to_string(), "disconnect".to_string()]));
    }
}
