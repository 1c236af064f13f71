//! WebSocket close codes used by the gateway.

/// A WebSocket close code with a fixed meaning on this gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CloseCode(u16);

impl CloseCode {
    /// Normal closure.
    pub const NORMAL: CloseCode = CloseCode(1000);
    /// Server going down.
    pub const GOING_AWAY: CloseCode = CloseCode(1001);
    /// Client sent commands faster than its window allows.
    pub const RATE_LIMITED: CloseCode = CloseCode(4008);

    pub const fn as_u16(self) -> u16 {
        self.0
    }

    /// Human-readable reason sent alongside the code.
    pub fn reason(self) -> &'static str {
        match self {
            CloseCode::NORMAL => "Connection closed",
            CloseCode::GOING_AWAY => "Server shutting down",
            CloseCode::RATE_LIMITED => "You are being rate limited.",
            _ => "",
        }
    }
}

impl From<CloseCode> for u16 {
    fn from(code: CloseCode) -> Self {
        code.0
    }
}

impl std::fmt::Display for CloseCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
