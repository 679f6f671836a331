//! # Console Commands
//!
//! The line-oriented surface standing in for the customer display.
//!
//! ```text
//! scan <code>        push a frame carrying <code> through the camera
//! sku <code>         manual entry (not debounced)
//! inc|dec|rm <id>    adjust a cart line by product id
//! cart               show the cart
//! checkout           open payment selection
//! pay cash|card      confirm payment and check out
//! cancel             abandon payment selection
//! status             scanner, checkout and draft sync state
//! help               this list
//! quit               exit
//! ```

use std::str::FromStr;

use scanpay_core::{PaymentMethod, ProductId};

use crate::error::KioskError;

pub const HELP: &str = "\
Commands:
  scan <code>       scan a code through the camera
  sku <code>        type in a product code
  inc <id>          add one more of a cart line
  dec <id>          remove one of a cart line
  rm <id>           remove a cart line
  cart              show the cart
  checkout          start checkout
  pay cash|card     pay and finish checkout
  cancel            cancel checkout
  status            show kiosk status
  quit              exit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Scan(String),
    Sku(String),
    Increment(ProductId),
    Decrement(ProductId),
    Remove(ProductId),
    Cart,
    Checkout,
    Pay(PaymentMethod),
    Cancel,
    Status,
    Help,
    Quit,
}

impl FromStr for Command {
    type Err = KioskError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (line, ""),
        };

        let arg = |usage: &str| -> Result<String, KioskError> {
            if rest.is_empty() {
                Err(KioskError::validation(format!("Usage: {}", usage)))
            } else {
                Ok(rest.to_string())
            }
        };
        let id = |usage: &str| -> Result<ProductId, KioskError> { Ok(arg(usage)?.parse::<ProductId>()?) };

        match word.to_lowercase().as_str() {
            "scan" => Ok(Command::Scan(arg("scan <code>")?)),
            "sku" => Ok(Command::Sku(arg("sku <code>")?)),
            "inc" | "+" => Ok(Command::Increment(id("inc <id>")?)),
            "dec" | "-" => Ok(Command::Decrement(id("dec <id>")?)),
            "rm" | "remove" => Ok(Command::Remove(id("rm <id>")?)),
            "cart" | "ls" => Ok(Command::Cart),
            "checkout" => Ok(Command::Checkout),
            "pay" => Ok(Command::Pay(arg("pay cash|card")?.parse()?)),
            "cancel" => Ok(Command::Cancel),
            "status" => Ok(Command::Status),
            "help" | "?" => Ok(Command::Help),
            "quit" | "exit" | "q" => Ok(Command::Quit),
            "" => Err(KioskError::validation("Type 'help' for commands")),
            other => Err(KioskError::validation(format!(
                "Unknown command '{}'. Type 'help' for commands",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        assert_eq!("scan A1".parse::<Command>().unwrap(), Command::Scan("A1".into()));
        assert_eq!("  SKU  8901234567890 ".parse::<Command>().unwrap(), Command::Sku("8901234567890".into()));
        assert_eq!("inc 1".parse::<Command>().unwrap(), Command::Increment(ProductId(1)));
        assert_eq!("rm 2".parse::<Command>().unwrap(), Command::Remove(ProductId(2)));
        assert_eq!("pay card".parse::<Command>().unwrap(), Command::Pay(PaymentMethod::Card));
        assert_eq!("quit".parse::<Command>().unwrap(), Command::Quit);
    }

    #[test]
    fn test_parse_errors() {
        assert!("scan".parse::<Command>().is_err());
        assert!("dec abc".parse::<Command>().is_err());
        assert!("pay bitcoin".parse::<Command>().is_err());
        assert!("dance".parse::<Command>().is_err());
        assert!("".parse::<Command>().is_err());
    }
}
