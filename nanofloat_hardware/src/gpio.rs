//! Raspberry Pi GPIO backend for the piston (H-bridge lines, limit switch,
//! encoder phase A interrupt).

use std::sync::Arc;

use nanofloat_traits::{EdgeSink, LimitState, LimitSwitch, MotorCommand, MotorDriver};
use rppal::gpio::{Gpio, InputPin, Level, OutputPin, Trigger};
use tracing::{debug, info};

use crate::error::{HwError, Result};

fn open_gpio() -> Result<Gpio> {
    Gpio::new().map_err(|e| HwError::Gpio(e.to_string()))
}

fn pin_err(pin: u8) -> impl FnOnce(rppal::gpio::Error) -> HwError {
    move |e| HwError::PinUnavailable {
        pin,
        reason: e.to_string(),
    }
}

/// H-bridge driven by two direction lines.
pub struct GpioMotor {
    extend: OutputPin,
    retract: OutputPin,
}

impl GpioMotor {
    pub fn new(extend_pin: u8, retract_pin: u8) -> Result<Self> {
        let gpio = open_gpio()?;
        let mut extend = gpio.get(extend_pin).map_err(pin_err(extend_pin))?.into_output();
        let mut retract = gpio
            .get(retract_pin)
            .map_err(pin_err(retract_pin))?
            .into_output();
        extend.set_low();
        retract.set_low();
        Ok(Self { extend, retract })
    }
}

impl MotorDriver for GpioMotor {
    fn drive(&mut self, command: MotorCommand) {
        // Release the opposite line first so both are never high together.
        match command {
            MotorCommand::Extend => {
                self.retract.set_low();
                self.extend.set_high();
            }
            MotorCommand::Retract => {
                self.extend.set_low();
                self.retract.set_high();
            }
            MotorCommand::Stop => {
                self.extend.set_low();
                self.retract.set_low();
            }
        }
        debug!(?command, "motor lines set");
    }
}

/// Limit switch on a pulled-down input, energized through an enable line.
pub struct GpioLimitSwitch {
    input: InputPin,
    enable: OutputPin,
    enabled: bool,
}

impl GpioLimitSwitch {
    pub fn new(input_pin: u8, enable_pin: u8, enabled: bool) -> Result<Self> {
        let gpio = open_gpio()?;
        let input = gpio
            .get(input_pin)
            .map_err(pin_err(input_pin))?
            .into_input_pulldown();
        let enable = gpio.get(enable_pin).map_err(pin_err(enable_pin))?.into_output();
        let mut sw = Self {
            input,
            enable,
            enabled,
        };
        sw.set_enabled(enabled);
        Ok(sw)
    }
}

impl LimitSwitch for GpioLimitSwitch {
    fn read(&self) -> LimitState {
        if self.enabled && self.input.is_high() {
            LimitState::Triggered
        } else {
            LimitState::Clear
        }
    }

    fn set_enabled(&mut self, enabled: bool) {
        if enabled {
            self.enable.set_high();
        } else {
            self.enable.set_low();
        }
        self.enabled = enabled;
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }
}

/// Keeps the encoder input pin (and with it the interrupt thread) alive.
pub struct EncoderInterrupt {
    _pin: InputPin,
}

/// Count rising edges of encoder phase A into `sink`.
///
/// Only one phase is watched, so the edges carry no direction.
pub fn attach_encoder(pin_a: u8, sink: Arc<dyn EdgeSink>) -> Result<EncoderInterrupt> {
    let gpio = open_gpio()?;
    let mut pin = gpio.get(pin_a).map_err(pin_err(pin_a))?.into_input();
    pin.set_async_interrupt(Trigger::RisingEdge, move |_level: Level| sink.on_edge())
        .map_err(|e| HwError::Interrupt(e.to_string()))?;
    info!(pin = pin_a, "encoder interrupt armed");
    Ok(EncoderInterrupt { _pin: pin })
}
