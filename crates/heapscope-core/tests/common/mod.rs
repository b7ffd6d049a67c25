//! In-memory stand-in for a host debugger attached to a managed process.
//!
//! Objects live in one byte arena starting at [`BASE`]. Plain objects have an
//! 8-byte header followed by one 8-byte slot per field; arrays have a 16-byte
//! header followed by packed elements. Runtime entry points are answered by
//! matching the expression text, and every query is counted so tests can
//! assert how many round-trips an operation cost.

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};

use heapscope_core::prelude::*;
use regex::Regex;

/// First address of the arena.
pub const BASE: u64 = 0x1000_0000;
/// Capacity of the runtime scratch buffer.
pub const BUFFER_SIZE: usize = 256;
/// An address outside the arena.
pub const UNMAPPED: u64 = 0xdead_0000;

/// Runtime field kind tags.
pub mod tag
{
    pub const OBJECT: i64 = 0;
    pub const NESTED: i64 = 1;
    pub const INT8: i64 = 2;
    pub const INT16: i64 = 3;
    pub const INT32: i64 = 4;
    pub const INT64: i64 = 5;
    pub const FLOAT32: i64 = 6;
    pub const FLOAT64: i64 = 7;
    pub const VOID_PTR: i64 = 8;
    pub const BOOL: i64 = 9;
}

/// Bytes a value of `tag` occupies.
pub fn size_of(tag: i64) -> usize
{
    match tag {
        tag::INT8 | tag::BOOL => 1,
        tag::INT16 => 2,
        tag::INT32 | tag::FLOAT32 => 4,
        _ => 8,
    }
}

struct TypeRecord
{
    name: String,
    fields: Vec<(i64, u64)>,
}

enum ObjectRecord
{
    Plain(u64),
    Array
    {
        tag: i64,
        count: usize,
    },
    Text(String),
}

struct Patterns
{
    resolve: Regex,
    classify: Regex,
    is_instance: Regex,
    to_utf8: Regex,
    buffer: Regex,
    field_count: Regex,
    field_name: Regex,
    field_type: Regex,
    field_address: Regex,
    type_name: Regex,
    getter: Regex,
}

impl Patterns
{
    fn new() -> Self
    {
        let re = |pattern: &str| Regex::new(pattern).unwrap();
        Self {
            resolve: re(r"^\*\(void \*\*\)\(\(uintptr_t\)\(\*\(void\*\*\)(0x[0-9a-f]+)\) & ~0x3\) == "),
            classify: re(r"^\(int\)\(IsInstance\((0x[0-9a-f]+), (0x[0-9a-f]+)\) \? 1 : \(\(int\)Konan_DebugIsArray\((0x[0-9a-f]+)\) \? 2 : 0\)\)$"),
            is_instance: re(r"^\(bool\)IsInstance\((0x[0-9a-f]+), (0x[0-9a-f]+)\)$"),
            to_utf8: re(r"^\(int\)Konan_DebugObjectToUtf8Array\((0x[0-9a-f]+), \(void \*\)(0x[0-9a-f]+), \(int\)Konan_DebugBufferSize\(\)\);$"),
            buffer: re(r"^\(void \*\)Konan_DebugBuffer\(\)$"),
            field_count: re(r"^\(int\)Konan_DebugGetFieldCount\((0x[0-9a-f]+)\)$"),
            field_name: re(r"^\(void \*\)Konan_DebugGetFieldName\((0x[0-9a-f]+), \(int\)(\d+)\)$"),
            field_type: re(r"^\(int\)Konan_DebugGetFieldType\((0x[0-9a-f]+), (\d+)\)$"),
            field_address: re(r"^\(void \*\)Konan_DebugGetFieldAddress\((0x[0-9a-f]+), (\d+)\)$"),
            type_name: re(r"^\(char \*\)Konan_DebugGetTypeName\((.+)\)$"),
            getter: re(r"^\(\((.+) \(\*\)\(\)\)(0x[0-9a-f]+)\)\(\)$"),
        }
    }
}

fn hex(text: &str) -> u64
{
    u64::from_str_radix(text.trim_start_matches("0x"), 16).unwrap()
}

/// Fake process plus host debugger.
pub struct FakeHeap
{
    memory: RefCell<Vec<u8>>,
    types: HashMap<u64, TypeRecord>,
    objects: HashMap<u64, ObjectRecord>,
    symbols: Vec<RuntimeSymbol>,
    getters: HashMap<u64, EvalValue>,
    broken_strings: HashSet<u64>,
    strides: HashMap<u64, u64>,
    string_type: u64,
    array_type: u64,
    buffer: u64,
    calls: RefCell<HashMap<String, usize>>,
    reads: RefCell<usize>,
    patterns: Patterns,
}

impl FakeHeap
{
    pub fn new() -> Self
    {
        let mut heap = Self {
            memory: RefCell::new(Vec::new()),
            types: HashMap::new(),
            objects: HashMap::new(),
            symbols: Vec::new(),
            getters: HashMap::new(),
            broken_strings: HashSet::new(),
            strides: HashMap::new(),
            string_type: 0,
            array_type: 0,
            buffer: 0,
            calls: RefCell::new(HashMap::new()),
            reads: RefCell::new(0),
            patterns: Patterns::new(),
        };
        heap.buffer = heap.alloc(BUFFER_SIZE);
        heap.string_type = heap.alloc_type_info();
        heap.array_type = heap.alloc_type_info();
        heap.types.insert(
            heap.string_type,
            TypeRecord {
                name: "kotlin.String".to_string(),
                fields: Vec::new(),
            },
        );
        heap.types.insert(
            heap.array_type,
            TypeRecord {
                name: "kotlin.Array".to_string(),
                fields: Vec::new(),
            },
        );
        heap.add_symbol("kclass:kotlin.String", heap.string_type);
        heap
    }

    // ---- building the heap ----

    fn alloc(&mut self, size: usize) -> u64
    {
        let memory = self.memory.get_mut();
        let start = (memory.len() + 15) & !15;
        memory.resize(start + size.max(1), 0);
        BASE + start as u64
    }

    fn write(&mut self, address: u64, bytes: &[u8])
    {
        let start = usize::try_from(address - BASE).unwrap();
        self.memory.get_mut()[start..start + bytes.len()].copy_from_slice(bytes);
    }

    fn write_word(&mut self, address: u64, value: u64)
    {
        self.write(address, &value.to_le_bytes());
    }

    fn alloc_type_info(&mut self) -> u64
    {
        let type_info = self.alloc(16);
        self.write_word(type_info, type_info);
        type_info
    }

    /// Allocate raw words outside any object.
    pub fn alloc_words(&mut self, words: &[u64]) -> u64
    {
        let address = self.alloc(8 * words.len());
        for (index, word) in words.iter().enumerate() {
            self.write_word(address + 8 * index as u64, *word);
        }
        address
    }

    /// Point `object`'s header at memory that is not a type-info block.
    pub fn corrupt_header(&mut self, object: ObjectAddress)
    {
        let junk = self.alloc_words(&[0x10]);
        let header = self.alloc_words(&[junk]);
        self.set_header(object, header);
    }

    /// Type-info of the string class.
    pub fn string_type(&self) -> TypeInfoAddress
    {
        TypeInfoAddress::from(self.string_type)
    }

    /// Declare a type with the given `(name, tag)` fields.
    pub fn define_type(&mut self, name: &str, fields: &[(&str, i64)]) -> TypeInfoAddress
    {
        let type_info = self.alloc_type_info();
        let mut records = Vec::new();
        for (field, tag) in fields {
            let pointer = self.alloc(64);
            let mut bytes = field.as_bytes().to_vec();
            bytes.push(0);
            self.write(pointer, &bytes);
            records.push((*tag, pointer));
        }
        self.types.insert(
            type_info,
            TypeRecord {
                name: name.to_string(),
                fields: records,
            },
        );
        TypeInfoAddress::from(type_info)
    }

    /// Allocate a zeroed instance of `ty`.
    pub fn new_object(&mut self, ty: TypeInfoAddress) -> ObjectAddress
    {
        let count = self.types[&ty.address().value()].fields.len();
        let object = self.alloc(8 + 8 * count);
        self.write_word(object, ty.address().value());
        self.objects.insert(object, ObjectRecord::Plain(ty.address().value()));
        ObjectAddress::from(object)
    }

    /// Allocate an instance whose header points at a meta-object of `ty`.
    pub fn new_object_via_meta(&mut self, ty: TypeInfoAddress) -> ObjectAddress
    {
        let object = self.new_object(ty);
        let meta = self.alloc(16);
        self.write_word(meta, ty.address().value());
        self.write_word(object.address().value(), meta);
        object
    }

    /// Store the low bytes of `value` in field `index` of `object`.
    pub fn set_field(&mut self, object: ObjectAddress, index: usize, value: u64)
    {
        let Some(ObjectRecord::Plain(ty)) = self.objects.get(&object.address().value()) else {
            panic!("{object} is not a plain object");
        };
        let tag = self.types[ty].fields[index].0;
        let bytes = value.to_le_bytes();
        self.write(object.address().value() + 8 + 8 * index as u64, &bytes[..size_of(tag)]);
    }

    /// Overwrite the header word of `object`.
    pub fn set_header(&mut self, object: ObjectAddress, header: u64)
    {
        self.write_word(object.address().value(), header);
    }

    /// Allocate a string object.
    pub fn new_string(&mut self, text: &str) -> ObjectAddress
    {
        let object = self.alloc(16);
        self.write_word(object, self.string_type);
        self.objects.insert(object, ObjectRecord::Text(text.to_string()));
        ObjectAddress::from(object)
    }

    /// Make the runtime report zero bytes when encoding `object`.
    pub fn break_string(&mut self, object: ObjectAddress)
    {
        self.broken_strings.insert(object.address().value());
    }

    /// Allocate an array holding `values`.
    pub fn new_array(&mut self, tag: i64, values: &[u64]) -> ObjectAddress
    {
        self.new_array_claiming(tag, values, values.len())
    }

    /// Allocate an array holding `values` that the runtime reports as `count` long.
    pub fn new_array_claiming(&mut self, tag: i64, values: &[u64], count: usize) -> ObjectAddress
    {
        let size = size_of(tag);
        let object = self.alloc(16 + size * values.len());
        self.write_word(object, self.array_type);
        for (index, value) in values.iter().enumerate() {
            self.write(object + 16 + (size * index) as u64, &value.to_le_bytes()[..size]);
        }
        self.objects.insert(object, ObjectRecord::Array { tag, count });
        ObjectAddress::from(object)
    }

    /// Make the runtime report elements of `array` `stride` bytes apart.
    pub fn spread_array(&mut self, array: ObjectAddress, stride: u64)
    {
        self.strides.insert(array.address().value(), stride);
    }

    /// Add a module symbol.
    pub fn add_symbol(&mut self, name: &str, address: u64)
    {
        self.symbols.push(RuntimeSymbol::new(name, Address::new(address)));
    }

    /// Add a global variable of `managed_type` whose getter returns `value`.
    pub fn add_global(&mut self, name: &str, managed_type: &str, value: EvalValue)
    {
        let storage = self.alloc(8);
        let getter = self.alloc(8);
        self.add_symbol(&format!("kvar:{name}#internal"), storage);
        self.add_symbol(&format!("kfun:<get-{name}>(){managed_type}"), getter);
        self.getters.insert(getter, value);
    }

    // ---- instrumentation ----

    /// Number of queries of `entry` (`"resolve"`, `"classify"`, or a runtime entry point name).
    pub fn calls(&self, entry: &str) -> usize
    {
        self.calls.borrow().get(entry).copied().unwrap_or(0)
    }

    /// Number of expressions evaluated.
    pub fn evaluations(&self) -> usize
    {
        self.calls.borrow().values().sum()
    }

    /// Number of raw memory reads.
    pub fn reads(&self) -> usize
    {
        *self.reads.borrow()
    }

    pub fn reset_counts(&self)
    {
        self.calls.borrow_mut().clear();
        *self.reads.borrow_mut() = 0;
    }

    fn bump(&self, entry: &str)
    {
        *self.calls.borrow_mut().entry(entry.to_string()).or_insert(0) += 1;
    }

    // ---- answering queries ----

    fn peek_word(&self, address: u64, expression: &str) -> InspectResult<u64>
    {
        let memory = self.memory.borrow();
        let start = address
            .checked_sub(BASE)
            .and_then(|offset| usize::try_from(offset).ok())
            .filter(|start| start + 8 <= memory.len())
            .ok_or_else(|| InspectError::Evaluation {
                expression: expression.to_string(),
                reason: format!("cannot read memory at {address:#x}"),
            })?;
        let mut word = [0u8; 8];
        word.copy_from_slice(&memory[start..start + 8]);
        Ok(u64::from_le_bytes(word))
    }

    fn record(&self, object: u64, expression: &str) -> InspectResult<&ObjectRecord>
    {
        self.objects.get(&object).ok_or_else(|| InspectError::Evaluation {
            expression: expression.to_string(),
            reason: format!("no object at {object:#x}"),
        })
    }

    fn type_name_of(&self, object: u64) -> Option<&str>
    {
        let ty = match self.objects.get(&object)? {
            ObjectRecord::Plain(ty) => *ty,
            ObjectRecord::Array { .. } => self.array_type,
            ObjectRecord::Text(_) => self.string_type,
        };
        self.types.get(&ty).map(|record| record.name.as_str())
    }

    fn field_address(&self, object: u64, index: u64, expression: &str) -> InspectResult<u64>
    {
        Ok(match self.record(object, expression)? {
            ObjectRecord::Plain(_) => object + 8 + 8 * index,
            ObjectRecord::Array { tag, .. } => {
                let stride = self.strides.get(&object).copied().unwrap_or(size_of(*tag) as u64);
                object.wrapping_add(16).wrapping_add(stride.wrapping_mul(index))
            }
            ObjectRecord::Text(_) => 0,
        })
    }

    fn answer(&self, expression: &str) -> InspectResult<EvalValue>
    {
        let p = &self.patterns;

        if let Some(caps) = p.resolve.captures(expression) {
            self.bump("resolve");
            let header = self.peek_word(hex(&caps[1]), expression)? & !0x3;
            let candidate = self.peek_word(header, expression)?;
            let first = self.peek_word(candidate, expression)?;
            let type_info = if first == candidate { candidate } else { 0 };
            return Ok(EvalValue::pointer(Address::new(type_info)));
        }
        if let Some(caps) = p.classify.captures(expression) {
            self.bump("classify");
            let object = hex(&caps[1]);
            let code = match self.record(object, expression)? {
                ObjectRecord::Text(_) if hex(&caps[2]) == self.string_type => 1,
                ObjectRecord::Array { .. } => 2,
                _ => 0,
            };
            return Ok(EvalValue::int(code));
        }
        if let Some(caps) = p.is_instance.captures(expression) {
            self.bump("IsInstance");
            let header = self.peek_word(hex(&caps[1]), expression)? & !0x3;
            return Ok(EvalValue::boolean(header == hex(&caps[2])));
        }
        if let Some(caps) = p.to_utf8.captures(expression) {
            self.bump("Konan_DebugObjectToUtf8Array");
            let object = hex(&caps[1]);
            let ObjectRecord::Text(text) = self.record(object, expression)? else {
                return Ok(EvalValue::int(0));
            };
            if self.broken_strings.contains(&object) {
                return Ok(EvalValue::int(0));
            }
            let bytes = &text.as_bytes()[..text.len().min(BUFFER_SIZE)];
            let start = usize::try_from(hex(&caps[2]) - BASE).unwrap();
            self.memory.borrow_mut()[start..start + bytes.len()].copy_from_slice(bytes);
            return Ok(EvalValue::int(i32::try_from(bytes.len()).unwrap()));
        }
        if p.buffer.is_match(expression) {
            self.bump("Konan_DebugBuffer");
            return Ok(EvalValue::pointer(Address::new(self.buffer)));
        }
        if let Some(caps) = p.field_count.captures(expression) {
            self.bump("Konan_DebugGetFieldCount");
            let count = match self.record(hex(&caps[1]), expression)? {
                ObjectRecord::Plain(ty) => self.types[ty].fields.len(),
                ObjectRecord::Array { count, .. } => *count,
                ObjectRecord::Text(_) => 0,
            };
            return Ok(EvalValue::int(i32::try_from(count).unwrap()));
        }
        if let Some(caps) = p.field_name.captures(expression) {
            self.bump("Konan_DebugGetFieldName");
            let index: usize = caps[2].parse().unwrap();
            let pointer = match self.record(hex(&caps[1]), expression)? {
                ObjectRecord::Plain(ty) => self.types[ty].fields.get(index).map_or(0, |field| field.1),
                _ => 0,
            };
            return Ok(EvalValue::pointer(Address::new(pointer)));
        }
        if let Some(caps) = p.field_type.captures(expression) {
            self.bump("Konan_DebugGetFieldType");
            let index: usize = caps[2].parse().unwrap();
            let kind = match self.record(hex(&caps[1]), expression)? {
                ObjectRecord::Plain(ty) => self.types[ty].fields.get(index).map_or(-1, |field| field.0),
                ObjectRecord::Array { tag, .. } => *tag,
                ObjectRecord::Text(_) => -1,
            };
            return Ok(EvalValue::int(i32::try_from(kind).unwrap()));
        }
        if let Some(caps) = p.field_address.captures(expression) {
            self.bump("Konan_DebugGetFieldAddress");
            let address = self.field_address(hex(&caps[1]), caps[2].parse().unwrap(), expression)?;
            return Ok(EvalValue::pointer(Address::new(address)));
        }
        if let Some(caps) = p.type_name.captures(expression) {
            self.bump("Konan_DebugGetTypeName");
            let name = caps[1]
                .parse::<Address>()
                .ok()
                .and_then(|address| self.type_name_of(address.value()));
            return Ok(match name {
                Some(name) => EvalValue::pointer(Address::new(BASE)).with_summary(format!("\"{name}\"")),
                None => EvalValue::pointer(Address::ZERO),
            });
        }
        if let Some(caps) = p.getter.captures(expression) {
            self.bump("getter");
            if let Some(value) = self.getters.get(&hex(&caps[2])) {
                return Ok(value.clone());
            }
        }

        Err(InspectError::Evaluation {
            expression: expression.to_string(),
            reason: "unsupported expression".to_string(),
        })
    }
}

impl TargetHost for FakeHeap
{
    fn evaluate(&self, expression: &str) -> InspectResult<EvalValue>
    {
        self.answer(expression)
    }

    fn read_memory(&self, address: Address, len: usize) -> InspectResult<Vec<u8>>
    {
        *self.reads.borrow_mut() += 1;
        let memory = self.memory.borrow();
        address
            .value()
            .checked_sub(BASE)
            .and_then(|offset| usize::try_from(offset).ok())
            .filter(|start| start + len <= memory.len())
            .map(|start| memory[start..start + len].to_vec())
            .ok_or_else(|| InspectError::MemoryReadFailure {
                address,
                len,
                reason: "unmapped".to_string(),
            })
    }

    fn module_symbols(&self) -> InspectResult<Vec<RuntimeSymbol>>
    {
        Ok(self.symbols.clone())
    }
}

/// Session over `heap` with default configuration.
pub fn session(heap: FakeHeap) -> Session<FakeHeap>
{
    Session::new(heap, InspectorConfig::default())
}
