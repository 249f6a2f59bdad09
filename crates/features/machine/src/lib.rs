//! Deterministic machine runtime.
//!
//! A [`Machine`] is built from a validated [`MachineConfig`](pinrig_domain::MachineConfig)
//! and owns everything that moves: switch states, coils, named delays, the event bus
//! and the ball-handling devices. Time only passes through [`Machine::advance`], so a
//! test can replay a ball's path through the machine millisecond by millisecond.
//!
//! ```rust
//! use pinrig_kernel::config::ConfigLoader;
//! use pinrig_kernel::domain::ValidationPasses;
//! use pinrig_kernel::validate_machine;
//! use pinrig_machine::Machine;
//!
//! let raw = ConfigLoader::new().env_prefix(None).load()?;
//! let config = validate_machine(&raw, ValidationPasses::ALL)?;
//! let mut machine = Machine::builder().config(&config).build()?;
//! machine.start()?;
//! machine.advance(100)?;
//! assert_eq!(machine.now(), 100);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod delays;
pub mod devices;
pub mod drivers;
pub mod error;
pub mod handler;
pub mod machine;
pub mod switches;
pub mod world;

pub use devices::{BallDevice, BallDeviceStatus, BallSave, ConfirmEject, DriverEnabled, Flipper, Mode, Playfield};
pub use drivers::{Coil, DriverAction, DriverBank, DriverPlatform, VirtualPlatform};
pub use error::{MachineError, MachineErrorExt};
pub use handler::{DeviceKind, Handler, Target};
pub use machine::{Machine, MachineBuilder};
pub use switches::{Switch, SwitchController};
pub use world::{TargetBoard, TargetStatus};
