//! Runtime symbol types.
//!
//! Symbols emitted by the managed-language compiler carry a kind prefix
//! (`kfun:`, `kclass:`, `kvar:`, `ktype:`). The maintenance commands use
//! these to find global variables and their getters.

use std::fmt;

use super::Address;

/// Kind of a runtime symbol, detected from its name prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SymbolKind
{
    /// Compiled function (`kfun:`).
    Function,
    /// Class type-info block (`kclass:`).
    Class,
    /// Global variable storage (`kvar:`).
    Variable,
    /// Type-info wrapper (`ktype:` / `ktypew:`).
    TypeInfo,
    /// Anything else: C symbols, runtime internals.
    Other,
}

impl SymbolKind
{
    /// Classify a raw symbol name.
    pub fn of(name: &str) -> Self
    {
        if name.starts_with("kfun:") {
            SymbolKind::Function
        } else if name.starts_with("kclass:") {
            SymbolKind::Class
        } else if name.starts_with("kvar:") {
            SymbolKind::Variable
        } else if name.starts_with("ktype:") || name.starts_with("ktypew:") {
            SymbolKind::TypeInfo
        } else {
            SymbolKind::Other
        }
    }
}

impl fmt::Display for SymbolKind
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        let label = match self {
            SymbolKind::Function => "function",
            SymbolKind::Class => "class",
            SymbolKind::Variable => "variable",
            SymbolKind::TypeInfo => "type-info",
            SymbolKind::Other => "other",
        };
        write!(f, "{label}")
    }
}

/// A named symbol with its load address in the inspected process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeSymbol
{
    name: String,
    address: Address,
}

impl RuntimeSymbol
{
    /// Construct from a name and load address.
    pub fn new(name: impl Into<String>, address: Address) -> Self
    {
        Self {
            name: name.into(),
            address,
        }
    }

    /// Raw symbol name.
    pub fn name(&self) -> &str
    {
        &self.name
    }

    /// Load address.
    pub fn address(&self) -> Address
    {
        self.address
    }

    /// Kind classification from the name prefix.
    pub fn kind(&self) -> SymbolKind
    {
        SymbolKind::of(&self.name)
    }

    /// Variable name for global storage symbols (`kvar:<name>#internal`).
    pub fn global_variable_name(&self) -> Option<&str>
    {
        self.name.strip_prefix("kvar:")?.strip_suffix("#internal")
    }

    /// Return type of a getter for `variable` (`kfun:<get-<variable>>()<type>`).
    pub fn getter_return_type(&self, variable: &str) -> Option<&str>
    {
        self.name
            .strip_prefix("kfun:<get-")?
            .strip_prefix(variable)?
            .strip_prefix(">()")
    }
}

impl fmt::Display for RuntimeSymbol
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        write!(f, "{}: {}", self.name, self.address)
    }
}
