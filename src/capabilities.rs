/// Optional model families compiled into this build. Decided at compile time
/// through cargo features; nothing is probed at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub seasonal: bool,
    pub autoregressive: bool,
    pub boosting: bool,
    pub isolation_forest: bool,
    pub tuning: bool,
}

impl Capabilities {
    pub const fn detect() -> Self {
        Self {
            seasonal: cfg!(feature = "seasonal"),
            autoregressive: cfg!(feature = "autoregressive"),
            boosting: cfg!(feature = "boosting"),
            isolation_forest: cfg!(feature = "isolation-forest"),
            tuning: cfg!(feature = "tuning"),
        }
    }

    pub const fn none() -> Self {
        Self {
            seasonal: false,
            autoregressive: false,
            boosting: false,
            isolation_forest: false,
            tuning: false,
        }
    }
}

pub const CAPABILITIES: Capabilities = Capabilities::detect();
