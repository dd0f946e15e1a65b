/// One decoded input report. Rebuilt from scratch for every notification
/// and discarded after it has been rendered to the console.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct InputSample {
    pub tick: u8,

    // Button states
    pub top_button: bool,
    pub stick_button: bool,

    // Joystick, nominally [-1, 1] but unclamped
    pub stick_x: f32,
    pub stick_y: f32,

    // Gyroscope
    pub gyro_x: f32,
    pub gyro_y: f32,
    pub gyro_z: f32,
    pub gyro_w: f32,

    // Accelerometer
    pub accel_x: f32,
    pub accel_y: f32,
    pub accel_z: f32,
}

impl InputSample {
    /// Render the sample as it appears in the status console.
    pub fn console_line(&self) -> String {
        format!(
            "t:{:3}, btn1:{}, btn2:{}, joy:({:5.2},{:5.2}), gyro:({:6.2},{:6.2},{:6.2},{:6.2}) acc:({:5.2},{:5.2},{:5.2})",
            self.tick,
            self.top_button,
            self.stick_button,
            self.stick_x,
            self.stick_y,
            self.gyro_x,
            self.gyro_y,
            self.gyro_z,
            self.gyro_w,
            self.accel_x,
            self.accel_y,
            self.accel_z,
        )
    }
}

/// Static device information, read once right after connecting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub manufacturer: String,
    pub software_revision: String,
    pub battery_percent: u8,
}

/// Where the single session currently is. The connect action is offered
/// exactly while `allows_start` holds.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    Idle,
    Scanning,
    Connecting,
    Connected(DeviceInfo),
    Listening,
    Error,
}

impl SessionState {
    pub fn allows_start(&self) -> bool {
        matches!(self, Self::Idle | Self::Error)
    }
}

/// Commands the UI issues into the session driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionCommand {
    Start,
    Stop,
}

/// Events the session driver pushes back to the UI.
#[derive(Debug, Clone)]
pub enum AppEvent {
    Log(StatusMessage),
    State(SessionState),
}

#[derive(Debug, Clone)]
pub struct StatusMessage {
    pub message: String,
    pub severity: MessageSeverity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageSeverity {
    Info,
    Success,
    Warning,
    Error,
}
