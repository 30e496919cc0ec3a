//! Spinning cube demo: two message types and the handlers that react to them.
//!
//! - `ChangeColor` (Update) recolors the cube
//! - `SwitchDirection` (FixedUpdate) reverses its spin

use std::cell::Cell;
use std::rc::Rc;

use herald_core::domain::info::Verbose;
use herald_core::{Bus, Envelope, Handler, HandlerError, Message, MessageType, Phase, Subscription};
use rand::Rng;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Color {
    Red,
    Green,
    Blue,
}

impl Color {
    pub const ALL: [Color; 3] = [Color::Red, Color::Green, Color::Blue];

    pub fn random(rng: &mut impl Rng) -> Self {
        Self::ALL[rng.gen_range(0..Self::ALL.len())]
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ChangeColor {
    pub color: Color,
}

impl Message for ChangeColor {
    const TYPE: MessageType = MessageType::new("demo.change_color");
}

#[derive(Debug, Clone, Copy)]
pub struct SwitchDirection;

impl Message for SwitchDirection {
    const TYPE: MessageType = MessageType::new("demo.switch_direction");

    fn phase(&self) -> Phase {
        Phase::FixedUpdate
    }
}

#[derive(Debug)]
pub struct SpinningCube {
    color: Cell<Color>,
    angular_velocity: Cell<f64>,
    color_changes: Cell<u64>,
    direction_switches: Cell<u64>,
}

impl Default for SpinningCube {
    fn default() -> Self {
        Self {
            color: Cell::new(Color::Red),
            angular_velocity: Cell::new(2.0),
            color_changes: Cell::new(0),
            direction_switches: Cell::new(0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CubeSnapshot {
    pub color: Color,
    pub angular_velocity: f64,
    pub color_changes: u64,
    pub direction_switches: u64,
}

impl SpinningCube {
    pub fn snapshot(&self) -> CubeSnapshot {
        CubeSnapshot {
            color: self.color.get(),
            angular_velocity: self.angular_velocity.get(),
            color_changes: self.color_changes.get(),
            direction_switches: self.direction_switches.get(),
        }
    }
}

struct SetColor {
    cube: Rc<SpinningCube>,
    bus: Bus,
}

impl Handler<ChangeColor> for SetColor {
    fn handle(&self, msg: &ChangeColor, _envelope: &Envelope) -> Result<(), HandlerError> {
        if self.cube.color.get() == msg.color {
            self.bus.emit(
                Verbose::new("cube", "color unchanged")
                    .with_value(serde_json::json!(msg.color)),
            );
            return Ok(());
        }
        self.cube.color.set(msg.color);
        self.cube.color_changes.set(self.cube.color_changes.get() + 1);
        Ok(())
    }
}

struct Reverse {
    cube: Rc<SpinningCube>,
}

impl Handler<SwitchDirection> for Reverse {
    fn handle(&self, _msg: &SwitchDirection, _envelope: &Envelope) -> Result<(), HandlerError> {
        self.cube
            .angular_velocity
            .set(-self.cube.angular_velocity.get());
        self.cube
            .direction_switches
            .set(self.cube.direction_switches.get() + 1);
        Ok(())
    }
}

/// Subscribes the cube's handlers. They stay registered while the returned
/// subscriptions are alive.
pub fn wire(cube: &Rc<SpinningCube>, bus: &Bus) -> Vec<Subscription> {
    vec![
        bus.subscribe_named::<ChangeColor, _>(
            "set_color",
            SetColor {
                cube: Rc::clone(cube),
                bus: bus.clone(),
            },
        ),
        bus.subscribe_named::<SwitchDirection, _>(
            "reverse",
            Reverse {
                cube: Rc::clone(cube),
            },
        ),
    ]
}

/// Emits up to `burst` random cube messages.
pub fn emit_random(bus: &Bus, rng: &mut impl Rng, burst: u32) {
    for _ in 0..rng.gen_range(0..=burst) {
        if rng.gen_bool(0.25) {
            bus.emit(SwitchDirection);
        } else {
            bus.emit(ChangeColor {
                color: Color::random(rng),
            });
        }
    }
}
