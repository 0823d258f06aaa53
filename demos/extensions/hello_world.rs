//! Prints a greeting once and exits.

use hotbed_sdk::prelude::*;

#[derive(Default)]
pub struct HelloWorld {
    message: String,
}

impl Extension for HelloWorld {
    fn name(&self) -> &str {
        "Hello World"
    }

    fn version(&self) -> &str {
        "1.0.0"
    }

    fn description(&self) -> &str {
        "Logs a greeting when loaded"
    }

    fn prepare(&mut self, logger: &Logger) -> Result<(), ExtensionError> {
        logger.info("Preparing HelloWorld");
        self.message = "Hello, World!".to_string();
        Ok(())
    }

    fn execute(&mut self, logger: &Logger) -> Result<(), ExtensionError> {
        logger.info(&self.message);
        println!("{}", self.message);
        Ok(())
    }
}

hotbed_sdk::export_extensions!(HelloWorld);
