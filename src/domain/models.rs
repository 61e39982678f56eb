use std::fmt;

/// Number of bytes in a drive command frame.
pub const FRAME_LEN: usize = 4;

/// One of the four drive axes controlled from the keyboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    /// All directions in canonical frame order.
    pub const ALL: [Direction; FRAME_LEN] = [
        Direction::Up,
        Direction::Down,
        Direction::Left,
        Direction::Right,
    ];

    /// Map a key name reported by the input source to a direction.
    ///
    /// Anything other than the four arrow names is not ours and yields `None`.
    pub fn from_key_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "up" => Some(Self::Up),
            "down" => Some(Self::Down),
            "left" => Some(Self::Left),
            "right" => Some(Self::Right),
            _ => None,
        }
    }

    pub fn key_name(self) -> &'static str {
        match self {
            Self::Up => "up",
            Self::Down => "down",
            Self::Left => "left",
            Self::Right => "right",
        }
    }

    pub(crate) fn index(self) -> usize {
        match self {
            Self::Up => 0,
            Self::Down => 1,
            Self::Left => 2,
            Self::Right => 3,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key_name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyTransition {
    Pressed,
    Released,
}

/// A key transition as delivered by the input source, before filtering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawKeyEvent {
    pub key: String,
    pub transition: KeyTransition,
}

impl RawKeyEvent {
    pub fn pressed(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            transition: KeyTransition::Pressed,
        }
    }

    pub fn released(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            transition: KeyTransition::Released,
        }
    }
}

/// Held/released flag for every direction. Plain value, safe to hand across threads.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KeyState {
    held: [bool; FRAME_LEN],
}

impl KeyState {
    pub fn get(&self, direction: Direction) -> bool {
        self.held[direction.index()]
    }

    pub(crate) fn set(&mut self, direction: Direction, held: bool) {
        self.held[direction.index()] = held;
    }

    /// Directions currently held, in frame order.
    pub fn held(&self) -> impl Iterator<Item = Direction> + '_ {
        Direction::ALL.into_iter().filter(|d| self.get(*d))
    }

    pub fn is_idle(&self) -> bool {
        self.held.iter().all(|h| !h)
    }
}

impl fmt::Display for KeyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let held: Vec<&str> = self.held().map(Direction::key_name).collect();
        if held.is_empty() {
            f.write_str("idle")
        } else {
            f.write_str(&held.join("+"))
        }
    }
}

/// Drive characteristic payload.
///
/// ```text
/// [0] : Up    (0 or 1)
/// [1] : Down  (0 or 1)
/// [2] : Left  (0 or 1)
/// [3] : Right (0 or 1)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandFrame([u8; FRAME_LEN]);

impl CommandFrame {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl From<&KeyState> for CommandFrame {
    fn from(state: &KeyState) -> Self {
        let mut bytes = [0u8; FRAME_LEN];
        for direction in Direction::ALL {
            bytes[direction.index()] = u8::from(state.get(direction));
        }
        Self(bytes)
    }
}

/// A snapshot handed from the input thread to the command context.
///
/// `seq` increases by one for every published change, so the receiving side
/// can tell a newer snapshot from an older one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchRequest {
    pub seq: u64,
    pub state: KeyState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatcherState {
    Disconnected,
    Connecting,
    Connected,
    Writing,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(up: bool, down: bool, left: bool, right: bool) -> KeyState {
        let mut s = KeyState::default();
        s.set(Direction::Up, up);
        s.set(Direction::Down, down);
        s.set(Direction::Left, left);
        s.set(Direction::Right, right);
        s
    }

    #[test]
    fn test_frame_byte_order() {
        let frame = CommandFrame::from(&state(true, false, true, false));
        assert_eq!(frame.as_bytes(), &[1, 0, 1, 0]);

        let frame = CommandFrame::from(&state(false, true, false, true));
        assert_eq!(frame.as_bytes(), &[0, 1, 0, 1]);
    }

    #[test]
    fn test_idle_frame_is_all_zero() {
        let frame = CommandFrame::from(&KeyState::default());
        assert_eq!(frame.as_bytes(), &[0; FRAME_LEN]);
    }

    #[test]
    fn test_key_names() {
        assert_eq!(Direction::from_key_name("up"), Some(Direction::Up));
        assert_eq!(Direction::from_key_name("RIGHT"), Some(Direction::Right));
        assert_eq!(Direction::from_key_name("space"), None);
        assert_eq!(Direction::from_key_name(""), None);
        for d in Direction::ALL {
            assert_eq!(Direction::from_key_name(d.key_name()), Some(d));
        }
    }

    #[test]
    fn test_state_display() {
        assert_eq!(KeyState::default().to_string(), "idle");
        assert_eq!(state(true, false, false, true).to_string(), "up+right");
    }
}
