//! Raw terminal key decoding.
//!
//! Small state machine over single bytes: `Normal`, `SawEscape` (after `ESC`) and
//! `SawBracket` (after `ESC [`). Lookahead is bounded to those two bytes; anything that does
//! not complete a known sequence is dropped and decoding resumes in `Normal`.

const ESC: u8 = 0x1b;
const CTRL_C: u8 = 0x03;

/// Transport command decoded from keyboard input.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    Quit,
    Interrupt,
    TogglePause,
    SeekForward,
    SeekBackward,
    VolumeUp,
    VolumeDown,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
enum State {
    #[default]
    Normal,
    SawEscape,
    SawBracket,
}

/// Incremental decoder; feed it one byte at a time.
#[derive(Debug, Default)]
pub struct KeyDecoder {
    state: State,
}

impl KeyDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// True while a sequence is partially read.
    pub fn is_pending(&self) -> bool {
        self.state != State::Normal
    }

    /// Drop any partial sequence.
    pub fn reset(&mut self) {
        self.state = State::Normal;
    }

    pub fn feed(&mut self, byte: u8) -> Option<Command> {
        match self.state {
            State::Normal => self.normal(byte),
            State::SawEscape => {
                if byte == b'[' {
                    self.state = State::SawBracket;
                    None
                } else {
                    // Not a CSI sequence: the ESC and this byte are both dropped.
                    tracing::debug!(byte, "discarding incomplete escape");
                    self.state = State::Normal;
                    None
                }
            }
            State::SawBracket => {
                self.state = State::Normal;
                match byte {
                    b'A' => Some(Command::VolumeUp),
                    b'B' => Some(Command::VolumeDown),
                    b'C' => Some(Command::SeekForward),
                    b'D' => Some(Command::SeekBackward),
                    _ => {
                        tracing::debug!(byte, "ignoring unknown escape sequence");
                        None
                    }
                }
            }
        }
    }

    fn normal(&mut self, byte: u8) -> Option<Command> {
        match byte {
            ESC => {
                self.state = State::SawEscape;
                None
            }
            b'q' => Some(Command::Quit),
            CTRL_C => Some(Command::Interrupt),
            b' ' => Some(Command::TogglePause),
            _ => None,
        }
    }
}
