//! # Maintenance Commands
//!
//! Commands a host debugger registers next to the summary and children hooks.
//! Each takes the raw argument string the user typed and reports through a
//! [`CommandOutput`], never by panicking or returning past the command
//! boundary.
//!
//! | Name | Arguments | Effect |
//! |------|-----------|--------|
//! | `clear_kotlin_cache` | none | drop cached layouts and providers |
//! | `type_name` | expression | runtime type name of the object it denotes |
//! | `type_by_address` | address | symbols loaded at that address |
//! | `symbol_by_name` | pattern | symbols whose name matches, de-duplicated |
//! | `konan_globals` | none | value of every global variable |

use std::collections::HashSet;
use std::fmt;

use regex::Regex;
use tracing::{debug, warn};

use crate::error::{InspectError, InspectResult};
use crate::host::{EvalValue, TargetHost};
use crate::session::Session;
use crate::types::{Address, ObjectAddress, RuntimeSymbol, SymbolKind};

/// Name of the cache-clearing command.
pub const CLEAR_CACHE: &str = "clear_kotlin_cache";
/// Name of the type-name lookup command.
pub const TYPE_NAME: &str = "type_name";
/// Name of the symbols-at-address command.
pub const TYPE_BY_ADDRESS: &str = "type_by_address";
/// Name of the symbol search command.
pub const SYMBOL_BY_NAME: &str = "symbol_by_name";
/// Name of the globals listing command.
pub const GLOBALS: &str = "konan_globals";

/// Every command name, in registration order.
pub const COMMAND_NAMES: [&str; 5] = [CLEAR_CACHE, TYPE_NAME, TYPE_BY_ADDRESS, SYMBOL_BY_NAME, GLOBALS];

/// A parsed maintenance command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command
{
    /// Drop the layout and object caches.
    ClearCache,
    /// Print the runtime type name of the object an expression denotes.
    TypeName
    {
        /// Expression passed verbatim to the host evaluator
        expression: String,
    },
    /// List symbols loaded at an address.
    TypeByAddress
    {
        /// Address (hex with `0x`, or decimal)
        address: Address,
    },
    /// List symbols whose name matches a pattern at its start.
    SymbolByName
    {
        /// Regular expression
        pattern: String,
    },
    /// List global variables with their current values.
    Globals,
}

impl Command
{
    /// Parse the command called `name` with raw argument text `args`.
    ///
    /// ## Errors
    ///
    /// `InvalidArgument` for unknown commands or missing/malformed arguments.
    pub fn parse(name: &str, args: &str) -> InspectResult<Self>
    {
        let first = args.split_whitespace().next();
        match name {
            CLEAR_CACHE => Ok(Command::ClearCache),
            GLOBALS => Ok(Command::Globals),
            TYPE_NAME => {
                let expression = args.trim();
                if expression.is_empty() {
                    return Err(InspectError::InvalidArgument(format!("{TYPE_NAME} needs an expression")));
                }
                Ok(Command::TypeName {
                    expression: expression.to_string(),
                })
            }
            TYPE_BY_ADDRESS => {
                let raw = first.ok_or_else(|| InspectError::InvalidArgument(format!("{TYPE_BY_ADDRESS} needs an address")))?;
                let address = raw
                    .parse::<Address>()
                    .map_err(|err| InspectError::InvalidArgument(format!("invalid address '{raw}': {err}")))?;
                Ok(Command::TypeByAddress { address })
            }
            SYMBOL_BY_NAME => {
                let pattern = first.ok_or_else(|| InspectError::InvalidArgument(format!("{SYMBOL_BY_NAME} needs a pattern")))?;
                Ok(Command::SymbolByName {
                    pattern: pattern.to_string(),
                })
            }
            other => Err(InspectError::InvalidArgument(format!("unknown command: {other}"))),
        }
    }

    /// Registered name of this command.
    pub fn name(&self) -> &'static str
    {
        match self {
            Command::ClearCache => CLEAR_CACHE,
            Command::TypeName { .. } => TYPE_NAME,
            Command::TypeByAddress { .. } => TYPE_BY_ADDRESS,
            Command::SymbolByName { .. } => SYMBOL_BY_NAME,
            Command::Globals => GLOBALS,
        }
    }
}

/// What a command reports to the host's result channel.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput
{
    messages: Vec<String>,
    error: Option<String>,
}

impl CommandOutput
{
    fn append_message(&mut self, message: impl Into<String>)
    {
        self.messages.push(message.into());
    }

    /// Lines to append to the result, in order.
    pub fn messages(&self) -> &[String]
    {
        &self.messages
    }

    /// Failure text, if the command failed.
    pub fn error(&self) -> Option<&str>
    {
        self.error.as_deref()
    }

    /// Whether the command completed.
    pub fn is_success(&self) -> bool
    {
        self.error.is_none()
    }
}

impl fmt::Display for CommandOutput
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        for message in &self.messages {
            writeln!(f, "{message}")?;
        }
        if let Some(error) = &self.error {
            writeln!(f, "error: {error}")?;
        }
        Ok(())
    }
}

/// Parse and run the command called `name`.
pub fn dispatch<H: TargetHost>(session: &mut Session<H>, name: &str, args: &str) -> CommandOutput
{
    match Command::parse(name, args) {
        Ok(command) => execute(session, &command),
        Err(err) => CommandOutput {
            messages: Vec::new(),
            error: Some(err.to_string()),
        },
    }
}

/// Run `command` against `session`.
///
/// Failures end up in [`CommandOutput::error`], after any lines already produced.
pub fn execute<H: TargetHost>(session: &mut Session<H>, command: &Command) -> CommandOutput
{
    debug!(command = command.name(), "executing command");
    let mut output = CommandOutput::default();
    let result = match command {
        Command::ClearCache => {
            session.clear_caches();
            Ok(())
        }
        Command::TypeName { expression } => type_name(session, expression, &mut output),
        Command::TypeByAddress { address } => type_by_address(session, *address, &mut output),
        Command::SymbolByName { pattern } => symbol_by_name(session, pattern, &mut output),
        Command::Globals => globals(session, &mut output),
    };
    if let Err(err) = result {
        warn!(command = command.name(), error = %err, "command failed");
        output.error = Some(err.to_string());
    }
    output
}

fn type_name<H: TargetHost>(session: &Session<H>, expression: &str, output: &mut CommandOutput) -> InspectResult<()>
{
    match session.runtime().type_name(expression)? {
        Some(name) => output.append_message(name),
        None => output.append_message("<unknown>"),
    }
    Ok(())
}

fn type_by_address<H: TargetHost>(session: &Session<H>, address: Address, output: &mut CommandOutput) -> InspectResult<()>
{
    for symbol in session.host().symbols_at(address)? {
        output.append_message(symbol.to_string());
    }
    Ok(())
}

fn symbol_by_name<H: TargetHost>(session: &Session<H>, pattern: &str, output: &mut CommandOutput) -> InspectResult<()>
{
    let mask = Regex::new(&format!("^(?:{pattern})"))
        .map_err(|err| InspectError::InvalidArgument(format!("invalid pattern '{pattern}': {err}")))?;

    let mut visited = HashSet::new();
    for symbol in session.host().module_symbols()? {
        if mask.is_match(symbol.name()) && visited.insert(symbol.name().to_string()) {
            output.append_message(symbol.to_string());
        }
    }
    Ok(())
}

fn globals<H: TargetHost>(session: &mut Session<H>, output: &mut CommandOutput) -> InspectResult<()>
{
    let symbols = session.host().module_symbols()?;
    let mut visited = HashSet::new();

    for symbol in symbols.iter().filter(|symbol| symbol.kind() == SymbolKind::Variable) {
        let Some(name) = symbol.global_variable_name() else {
            continue;
        };
        if !visited.insert(name) {
            continue;
        }

        let Some((getter, managed_type)) = find_getter(&symbols, name) else {
            output.append_message(format!("storage not found for name:{name}"));
            continue;
        };

        let conversion = GlobalConversion::for_type(managed_type);
        let text = match session.runtime().call_getter(conversion.c_type(), getter.address()) {
            Ok(value) => conversion.render(session, &value),
            Err(err) => format!("<error: {err}>"),
        };
        output.append_message(format!("{managed_type} {name}: {text}"));
    }
    Ok(())
}

fn find_getter<'a>(symbols: &'a [RuntimeSymbol], variable: &str) -> Option<(&'a RuntimeSymbol, &'a str)>
{
    symbols
        .iter()
        .find_map(|symbol| symbol.getter_return_type(variable).map(|ty| (symbol, ty)))
}

/// How a getter's return value is typed and printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GlobalConversion
{
    Signed(&'static str),
    Unsigned(&'static str),
    Float,
    Double,
    Object,
}

impl GlobalConversion
{
    fn for_type(managed_type: &str) -> Self
    {
        match managed_type {
            "kotlin.Byte" => GlobalConversion::Signed("int8_t"),
            "kotlin.Short" | "kotlin.Char" => GlobalConversion::Signed("short"),
            "kotlin.Int" => GlobalConversion::Signed("int"),
            "kotlin.Long" => GlobalConversion::Signed("long"),
            "kotlin.Boolean" => GlobalConversion::Signed("bool"),
            "kotlin.UByte" => GlobalConversion::Unsigned("int8_t"),
            "kotlin.UShort" => GlobalConversion::Unsigned("short"),
            "kotlin.UInt" => GlobalConversion::Unsigned("int"),
            "kotlin.ULong" => GlobalConversion::Unsigned("long"),
            "kotlin.Float" => GlobalConversion::Float,
            "kotlin.Double" => GlobalConversion::Double,
            _ => GlobalConversion::Object,
        }
    }

    fn c_type(self) -> &'static str
    {
        match self {
            GlobalConversion::Signed(c_type) | GlobalConversion::Unsigned(c_type) => c_type,
            GlobalConversion::Float => "float",
            GlobalConversion::Double => "double",
            GlobalConversion::Object => "ObjHeader *",
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    fn render<H: TargetHost>(self, session: &mut Session<H>, value: &EvalValue) -> String
    {
        match self {
            GlobalConversion::Signed(_) => value.signed().to_string(),
            GlobalConversion::Unsigned(_) => value.unsigned().to_string(),
            GlobalConversion::Float => f32::from_bits(value.unsigned() as u32).to_string(),
            GlobalConversion::Double => f64::from_bits(value.unsigned()).to_string(),
            GlobalConversion::Object => session
                .summary(ObjectAddress::from(value.unsigned()))
                .unwrap_or_else(|err| format!("<error: {err}>")),
        }
    }
}
