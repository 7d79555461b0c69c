//! Fuzz target: `RelayCommand::parse`
//!
//! Feeds arbitrary inbound payloads to the command parser and checks that a
//! payload either yields a command or a typed rejection, and that whatever
//! was accepted drives a relay to exactly that level.
//!
//! cargo fuzz run fuzz_command_parse

#![no_main]

use ctlink::app::commands::RelayCommand;
use ctlink::app::ports::RelayPort;
use ctlink::app::relay::RelayState;
use ctlink::error::ActuatorError;
use libfuzzer_sys::fuzz_target;

struct Pin(bool);

impl RelayPort for Pin {
    fn set_relay(&mut self, on: bool) -> Result<(), ActuatorError> {
        self.0 = on;
        Ok(())
    }
}

fuzz_target!(|data: &[u8]| {
    let Ok(cmd) = RelayCommand::parse(data) else {
        return;
    };

    let mut pin = Pin(!cmd.state);
    let mut relay = RelayState::new();
    let _ = relay.init(&mut pin, !cmd.state);
    assert!(relay.apply_command(cmd, &mut pin).is_ok());
    assert_eq!(pin.0, cmd.state, "relay must follow the parsed command");
    assert_eq!(relay.is_on(), cmd.state);
});
