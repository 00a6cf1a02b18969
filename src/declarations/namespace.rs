//! # Namespace
//!
//! Owns every [`Declaration`] by name and compiles type-name expressions on
//! demand. A type name is an optional base identifier followed by any run of
//! `*` and `[N]` suffixes; the rightmost suffix is the outermost type, so
//! `int32*[4]` is four pointers and `int32[4]*` points at one array.
//!
//! Compilation is lazy and memoized per declaration. Functions and
//! variables are bound against the shared [`SymbolResolver`].

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

use crate::declarations::compiled::{Compiled, MemberTable, MembersWrapper};
use crate::declarations::{
    ConstantsDecl, Declaration, DeclarationBody, FunctionDecl, StructDecl, VariableDecl,
};
use crate::ffi::call::ForeignFunction;
use crate::ffi::error::{AnnotateError, AnnotateResult};
use crate::ffi::symbols::SymbolResolver;
use crate::types::buffers::LiveVariable;
use crate::types::native::{NativeType, StructLayout};
use crate::types::primitive::Primitive;

/// A namespace behind one coarse lock
pub type SharedNamespace = Arc<Mutex<Namespace>>;

/// Name → declaration map with compiled-type cache
#[derive(Debug)]
pub struct Namespace {
    declarations: HashMap<String, Declaration>,
    order: Vec<String>,
    library: Arc<dyn SymbolResolver>,
    /// Declarations whose compilation is currently running, innermost last
    in_progress: Vec<String>,
    /// Lowest `in_progress` index referenced as opaque since the innermost
    /// compilation started
    opaque_floor: usize,
}

fn invalid_type_name(name: &str, reason: &str) -> AnnotateError {
    AnnotateError::InvalidTypeName {
        name: name.to_string(),
        reason: reason.to_string(),
    }
}

/// Split `element[N]` into its element name and length
fn split_array(name: &str) -> AnnotateResult<Option<(&str, usize)>> {
    let Some(inner) = name.strip_suffix(']') else {
        return Ok(None);
    };
    let open = inner
        .rfind('[')
        .ok_or_else(|| invalid_type_name(name, "`]` without matching `[`"))?;
    let len = inner[open + 1..]
        .trim()
        .parse::<usize>()
        .map_err(|_| invalid_type_name(name, "array length must be a non-negative integer"))?;
    let element = inner[..open].trim_end();
    if element.is_empty() {
        return Err(invalid_type_name(name, "array suffix without element type"));
    }
    Ok(Some((element, len)))
}

fn select(compiled: Compiled, unwrap: bool) -> Compiled {
    if unwrap {
        compiled.unwrapped()
    } else {
        compiled
    }
}

impl Namespace {
    pub fn new(library: Arc<dyn SymbolResolver>) -> Self {
        Self {
            declarations: HashMap::new(),
            order: Vec::new(),
            library,
            in_progress: Vec::new(),
            opaque_floor: usize::MAX,
        }
    }

    pub fn library(&self) -> &Arc<dyn SymbolResolver> {
        &self.library
    }

    /// Add a declaration. A second declaration with the same name replaces
    /// the first and keeps its position.
    pub fn register(&mut self, declaration: Declaration) {
        let name = declaration.name().to_string();
        debug!("Registered @{} {}", declaration.kind(), name);
        if let Some(previous) = self.declarations.insert(name.clone(), declaration) {
            warn!(
                "Declaration {} redeclared; @{} replaced",
                name,
                previous.kind()
            );
        } else {
            self.order.push(name);
        }
    }

    pub fn get(&self, name: &str) -> Option<&Declaration> {
        self.declarations.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.declarations.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Declared names in registration order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    /// Compile a type-name expression, keeping member wrappers
    pub fn compile(&mut self, name: &str) -> AnnotateResult<Compiled> {
        self.compile_with(name, false)
    }

    /// Compile a type-name expression to its bare native form
    pub fn compile_unwrap(&mut self, name: &str) -> AnnotateResult<Compiled> {
        self.compile_with(name, true)
    }

    pub fn compile_with(&mut self, name: &str, unwrap: bool) -> AnnotateResult<Compiled> {
        let name = name.trim();
        if name.is_empty() {
            return Err(invalid_type_name(name, "empty type name"));
        }

        if let Some(prefix) = name.strip_suffix('*') {
            let pointee = self.pointee(prefix.trim_end())?;
            return Ok(Compiled::Native(pointee.pointer_to()));
        }

        if let Some((element, len)) = split_array(name)? {
            let too_large = || invalid_type_name(name, "array size overflows the address space");
            return match self.compile_with(element, false)? {
                Compiled::Wrapped(wrapper) if !unwrap => {
                    let array = wrapper.array(len).ok_or_else(too_large)?;
                    Ok(Compiled::Wrapped(Arc::new(array)))
                }
                compiled => Self::as_type(element, compiled)?
                    .checked_array_of(len)
                    .map(Compiled::Native)
                    .ok_or_else(too_large),
            };
        }

        if name == "void" {
            return Ok(Compiled::Native(NativeType::Void));
        }
        if let Some(primitive) = Primitive::from_name(name) {
            return Ok(Compiled::Native(NativeType::Primitive(primitive)));
        }

        self.compile_declaration(name, unwrap)
    }

    /// Bare native type of a type-name expression
    pub fn native_type(&mut self, name: &str) -> AnnotateResult<NativeType> {
        let compiled = self.compile_with(name, true)?;
        Self::as_type(name, compiled)
    }

    /// Bound callable of a `@function` declaration
    pub fn function(&mut self, name: &str) -> AnnotateResult<Arc<ForeignFunction>> {
        match self.compile(name)? {
            Compiled::Function(function) => Ok(function),
            _ => Err(AnnotateError::usage(name, "not a function")),
        }
    }

    /// Declared type of a `@variable`, resolved once
    pub fn variable_type(&mut self, name: &str) -> AnnotateResult<NativeType> {
        let declaration = self
            .declarations
            .get(name)
            .ok_or_else(|| AnnotateError::unresolved(name))?;
        let DeclarationBody::Variable(VariableDecl { variable_type }) = declaration.body() else {
            return Err(AnnotateError::usage(name, "only variables have a value"));
        };
        if let Some(ty) = declaration.state().cached().and_then(Compiled::native_type) {
            return Ok(ty.clone());
        }

        let variable_type = variable_type.clone();
        let ty = self.native_type(&variable_type)?;
        if let Some(declaration) = self.declarations.get_mut(name) {
            declaration.state_mut().store(Compiled::Native(ty.clone()));
        }
        Ok(ty)
    }

    /// Live view of a `@variable`'s storage in the library
    pub fn value(&mut self, name: &str) -> AnnotateResult<LiveVariable> {
        let ty = self.variable_type(name)?;
        let address = self.library.data_address(name)?;
        debug!("Resolved variable {} at {:p}", name, address);
        LiveVariable::new(name, address.cast(), ty, Arc::clone(&self.library))
    }

    /// Compile every declaration except variables
    pub fn compile_all(&mut self) -> AnnotateResult<()> {
        let names: Vec<String> = self
            .order
            .iter()
            .filter(|name| self.declarations.get(*name).is_some_and(|d| !d.is_variable()))
            .cloned()
            .collect();
        for name in names {
            self.compile(&name)?;
        }
        Ok(())
    }

    /// Forget the compiled result of one declaration; variables are left alone
    pub fn reset(&mut self, name: &str) -> AnnotateResult<()> {
        let declaration = self
            .declarations
            .get_mut(name)
            .ok_or_else(|| AnnotateError::unresolved(name))?;
        if !declaration.is_variable() {
            declaration.state_mut().reset();
        }
        Ok(())
    }

    pub fn reset_all(&mut self) {
        for declaration in self.declarations.values_mut() {
            if !declaration.is_variable() {
                declaration.state_mut().reset();
            }
        }
    }

    /// JSON description of every declaration, in registration order
    pub fn describe(&self) -> AnnotateResult<serde_json::Value> {
        let mut entries = Vec::with_capacity(self.order.len());
        for declaration in self.order.iter().filter_map(|name| self.declarations.get(name)) {
            let mut entry = serde_json::to_value(declaration)?;
            if let Some(object) = entry.as_object_mut() {
                object.insert(
                    "compiled".to_string(),
                    serde_json::Value::Bool(declaration.is_compiled()),
                );
            }
            entries.push(entry);
        }
        Ok(serde_json::Value::Array(entries))
    }

    pub fn into_shared(self) -> SharedNamespace {
        Arc::new(Mutex::new(self))
    }

    fn as_type(name: &str, compiled: Compiled) -> AnnotateResult<NativeType> {
        match compiled.unwrapped() {
            Compiled::Native(ty) => Ok(ty),
            _ => Err(AnnotateError::usage(name, "a function cannot be used as a type")),
        }
    }

    /// Pointee of a `*` suffix; a declaration still being compiled is opaque
    fn pointee(&mut self, prefix: &str) -> AnnotateResult<NativeType> {
        if let Some(depth) = self.in_progress.iter().position(|name| name == prefix) {
            self.opaque_floor = self.opaque_floor.min(depth);
            return Ok(NativeType::Opaque(prefix.to_string()));
        }
        let compiled = self.compile_with(prefix, true)?;
        Self::as_type(prefix, compiled)
    }

    fn compile_declaration(&mut self, name: &str, unwrap: bool) -> AnnotateResult<Compiled> {
        let declaration = self
            .declarations
            .get(name)
            .ok_or_else(|| AnnotateError::unresolved(name))?;
        if declaration.is_variable() {
            return Err(AnnotateError::usage(
                name,
                "a variable is not a type; use its value instead",
            ));
        }
        if let Some(cached) = declaration.state().cached() {
            return Ok(select(cached.clone(), unwrap));
        }
        if self.in_progress.iter().any(|pending| pending == name) {
            return Err(AnnotateError::usage(name, "declaration contains itself by value"));
        }

        let body = declaration.body().clone();
        let depth = self.in_progress.len();
        let outer_floor = std::mem::replace(&mut self.opaque_floor, usize::MAX);
        self.in_progress.push(name.to_string());
        let result = self.compile_body(name, &body);
        self.in_progress.pop();
        let floor = self.opaque_floor;
        self.opaque_floor = outer_floor.min(floor);
        let compiled = result?;
        debug!("Compiled @{} {} as {}", body.kind(), name, compiled);

        // A layout holding an opaque outer declaration is only valid until
        // that declaration finishes, so it is not cached.
        if floor < depth {
            debug!("Not caching {}: refers to unfinished {}", name, self.in_progress[floor]);
            return Ok(select(compiled, unwrap));
        }
        let compiled = match self.declarations.get_mut(name) {
            Some(declaration) => declaration.state_mut().store(compiled),
            None => compiled,
        };
        Ok(select(compiled, unwrap))
    }

    fn compile_body(&mut self, name: &str, body: &DeclarationBody) -> AnnotateResult<Compiled> {
        match body {
            DeclarationBody::Function(FunctionDecl {
                return_type,
                argument_types,
            }) => {
                let return_type = self.native_type(return_type)?;
                let argument_types = argument_types
                    .iter()
                    .map(|argument| self.native_type(argument))
                    .collect::<AnnotateResult<Vec<_>>>()?;
                let function =
                    ForeignFunction::bind(name, return_type, argument_types, Arc::clone(&self.library))?;
                Ok(Compiled::Function(Arc::new(function)))
            }
            DeclarationBody::Struct(StructDecl { members }) => {
                let mut fields = Vec::with_capacity(members.len());
                if let MemberTable::Fields(declared) = members.as_ref() {
                    for (member, type_name) in declared {
                        fields.push((member.clone(), self.native_type(type_name)?));
                    }
                }
                let layout = StructLayout::new(name, fields)?;
                let wrapper =
                    MembersWrapper::new(name, NativeType::Struct(Arc::new(layout)), Arc::clone(members));
                Ok(Compiled::Wrapped(Arc::new(wrapper)))
            }
            DeclarationBody::Enum(constants) | DeclarationBody::Flags(constants) => {
                self.compile_constants(name, constants)
            }
            DeclarationBody::Typedef(typedef) => self.compile_with(&typedef.from_type, false),
            DeclarationBody::Variable(_) => Err(AnnotateError::usage(
                name,
                "a variable is not a type; use its value instead",
            )),
        }
    }

    fn compile_constants(&mut self, name: &str, constants: &ConstantsDecl) -> AnnotateResult<Compiled> {
        let underlying = self.native_type(&constants.underlying_type)?;
        let Some((min, max)) = underlying.as_primitive().and_then(Primitive::integer_range) else {
            return Err(AnnotateError::usage(
                name,
                format!("underlying type `{}` is not an integer type", underlying),
            ));
        };
        if let MemberTable::Constants(values) = constants.members.as_ref() {
            for (member, value) in values {
                if *value < min || *value > max {
                    warn!(
                        "{}.{} = {} does not fit in {}",
                        name, member, value, underlying
                    );
                }
            }
        }
        let wrapper = MembersWrapper::new(name, underlying, Arc::clone(&constants.members));
        Ok(Compiled::Wrapped(Arc::new(wrapper)))
    }
}
