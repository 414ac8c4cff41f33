//! Control events and the control state they drive.
//!
//! A [`ControlEvent`] is one input transition stamped with the simulated clock
//! at which it takes effect. The ordered events of one session form the replay
//! log. [`ControlState`] folds events into what the ship tasks read each tick.

use serde::{Deserialize, Serialize};

use crate::SimError;

/// Full-scale analog value. Analog inputs are integer thousandths so they are
/// exact on the wire.
pub const ANALOG_SCALE: i32 = 1000;

// ---------------------------------------------------------------------------
// Control
// ---------------------------------------------------------------------------

/// A player control. The declaration order is the wire code order and must
/// not change within a log format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Control {
    Thrust,
    Left,
    Right,
    /// Analog steering, negative is counter-clockwise.
    Turn,
    Fire,
    Hyperspace,
    Start,
}

impl Control {
    pub const ALL: [Control; 7] = [
        Control::Thrust,
        Control::Left,
        Control::Right,
        Control::Turn,
        Control::Fire,
        Control::Hyperspace,
        Control::Start,
    ];

    pub fn index(self) -> u64 {
        self as u64
    }

    pub fn from_index(index: u64) -> Option<Control> {
        Self::ALL.get(usize::try_from(index).ok()?).copied()
    }

    /// Whether the control accepts analog values.
    pub fn supports_analog(self) -> bool {
        matches!(self, Control::Thrust | Control::Turn)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InputKind {
    Digital,
    Analog,
}

// ---------------------------------------------------------------------------
// ControlEvent
// ---------------------------------------------------------------------------

/// One control transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlEvent {
    pub control: Control,
    pub kind: InputKind,
    /// Digital: 0 or 1. Analog: thousandths in `-1000..=1000`
    /// (`0..=1000` for thrust).
    pub value: i32,
    /// Simulated clock, in milliseconds, at which the event takes effect.
    pub timestamp: u64,
}

impl ControlEvent {
    pub fn digital(control: Control, pressed: bool, timestamp: u64) -> Self {
        Self {
            control,
            kind: InputKind::Digital,
            value: i32::from(pressed),
            timestamp,
        }
    }

    pub fn analog(control: Control, thousandths: i32, timestamp: u64) -> Self {
        Self {
            control,
            kind: InputKind::Analog,
            value: thousandths,
            timestamp,
        }
    }

    /// Check the value against the range for the control and kind.
    pub fn validate(&self) -> Result<(), SimError> {
        let valid = match self.kind {
            InputKind::Digital => matches!(self.value, 0 | 1),
            InputKind::Analog if self.control == Control::Thrust => {
                (0..=ANALOG_SCALE).contains(&self.value)
            }
            InputKind::Analog if self.control.supports_analog() => {
                (-ANALOG_SCALE..=ANALOG_SCALE).contains(&self.value)
            }
            InputKind::Analog => false,
        };
        if valid {
            Ok(())
        } else {
            Err(SimError::InvalidControlValue {
                control: self.control,
                kind: self.kind,
                value: self.value,
            })
        }
    }

    /// Value as a float in `-1.0..=1.0`.
    pub fn level(&self) -> f64 {
        match self.kind {
            InputKind::Digital => f64::from(self.value),
            InputKind::Analog => f64::from(self.value) / f64::from(ANALOG_SCALE),
        }
    }
}

// ---------------------------------------------------------------------------
// ControlState
// ---------------------------------------------------------------------------

/// Current control levels plus one-tick edge requests.
///
/// Fire, hyperspace and start act on the press edge only. The request flags
/// live for exactly one tick: the ship task consumes them, and the director
/// clears whatever is left at the end of the tick.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ControlState {
    pub thrust: f64,
    pub left: bool,
    pub right: bool,
    pub turn: f64,
    pub fire_held: bool,
    pub hyperspace_held: bool,
    pub fire_requested: bool,
    pub hyperspace_requested: bool,
    pub start_requested: bool,
}

impl ControlState {
    pub fn apply(&mut self, event: &ControlEvent) {
        let pressed = event.value != 0;
        match event.control {
            Control::Thrust => self.thrust = event.level(),
            Control::Left => self.left = pressed,
            Control::Right => self.right = pressed,
            Control::Turn => self.turn = event.level(),
            Control::Fire => {
                if pressed && !self.fire_held {
                    self.fire_requested = true;
                }
                self.fire_held = pressed;
            }
            Control::Hyperspace => {
                if pressed && !self.hyperspace_held {
                    self.hyperspace_requested = true;
                }
                self.hyperspace_held = pressed;
            }
            Control::Start => {
                if pressed {
                    self.start_requested = true;
                }
            }
        }
    }

    pub fn throttle(&self) -> f64 {
        self.thrust
    }

    /// Analog turn wins over the digital pair when it is non-zero.
    pub fn steer(&self) -> f64 {
        if self.turn != 0.0 {
            return self.turn;
        }
        f64::from(i8::from(self.right) - i8::from(self.left))
    }

    pub fn take_fire(&mut self) -> bool {
        std::mem::take(&mut self.fire_requested)
    }

    pub fn take_hyperspace(&mut self) -> bool {
        std::mem::take(&mut self.hyperspace_requested)
    }

    pub fn take_start(&mut self) -> bool {
        std::mem::take(&mut self.start_requested)
    }

    /// Drop edge requests nobody consumed this tick.
    pub fn end_tick(&mut self) {
        self.fire_requested = false;
        self.hyperspace_requested = false;
        self.start_requested = false;
    }
}
