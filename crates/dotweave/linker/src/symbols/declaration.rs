// Dotlanth
// Copyright (C) 2025 Synerthink

// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.

// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.

//! Declarations of the symbol graph

use crate::syntax::ast::{Block, Expr};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Arena index of a declaration, valid within one [`SymbolGraph`](super::graph::SymbolGraph) snapshot
/// and every graph extended from it
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DeclId(pub(crate) u32);

impl DeclId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for DeclId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "decl#{}", self.0)
    }
}

/// Structural identity of a declaration: its fully-qualified signature
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DeclarationKey(pub String);

impl DeclarationKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeclarationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DeclarationKey {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Accessibility {
    Public,
    Protected,
    ProtectedInternal,
    Internal,
    PrivateProtected,
    Private,
}

impl Accessibility {
    pub fn keyword(self) -> &'static str {
        match self {
            Accessibility::Public => "public",
            Accessibility::Protected => "protected",
            Accessibility::ProtectedInternal => "protected internal",
            Accessibility::Internal => "internal",
            Accessibility::PrivateProtected => "private protected",
            Accessibility::Private => "private",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeKind {
    Class,
    Struct,
    Interface,
}

impl TypeKind {
    pub fn keyword(self) -> &'static str {
        match self {
            TypeKind::Class => "class",
            TypeKind::Struct => "struct",
            TypeKind::Interface => "interface",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub ty: String,
}

impl Parameter {
    pub fn new(name: impl Into<String>, ty: impl Into<String>) -> Self {
        Self { name: name.into(), ty: ty.into() }
    }
}

/// Closed set of declaration kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeclarationKind {
    NamedType,
    Field,
    Constructor,
    Finalizer,
    Property,
    Method,
    Event,
}

/// What a method declaration is for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MethodRole {
    Ordinary,
    PropertyGet,
    PropertySet,
    EventAdd,
    EventRemove,
}

impl MethodRole {
    pub fn is_accessor(self) -> bool {
        !matches!(self, MethodRole::Ordinary)
    }

    /// Accessor keyword, `None` for ordinary methods
    pub fn accessor_keyword(self) -> Option<&'static str> {
        match self {
            MethodRole::Ordinary => None,
            MethodRole::PropertyGet => Some("get"),
            MethodRole::PropertySet => Some("set"),
            MethodRole::EventAdd => Some("add"),
            MethodRole::EventRemove => Some("remove"),
        }
    }
}

/// Interface member implemented explicitly by a declaration
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InterfaceImplementation {
    /// Full name of the declaring interface
    pub interface: String,
}

/// `: this(...)` / `: base(...)` on a constructor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstructorInitializer {
    pub kind: ConstructorInitializerKind,
    #[serde(default)]
    pub arguments: Vec<Expr>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstructorInitializerKind {
    This,
    Base,
}

/// Kind-specific payload of a declaration
#[derive(Debug, Clone, PartialEq)]
pub enum DeclarationData {
    NamedType {
        type_kind: TypeKind,
        namespace: Option<String>,
        /// Files holding the parts of a (possibly partial) type
        parts: Vec<String>,
        base_types: Vec<String>,
    },
    Field {
        ty: String,
        initializer: Option<Expr>,
    },
    Constructor {
        parameters: Vec<Parameter>,
        initializer: Option<ConstructorInitializer>,
        body: Block,
    },
    Finalizer {
        body: Block,
    },
    Property {
        ty: String,
        getter: Option<DeclId>,
        setter: Option<DeclId>,
        /// Auto-property: accessors have no bodies
        is_auto: bool,
        initializer: Option<Expr>,
    },
    Method {
        role: MethodRole,
        return_type: String,
        parameters: Vec<Parameter>,
        /// `None` for auto accessors and abstract members
        body: Option<Block>,
    },
    Event {
        ty: String,
        adder: Option<DeclId>,
        remover: Option<DeclId>,
        /// Field-like event: accessors have no bodies
        is_field_like: bool,
    },
}

impl DeclarationData {
    pub fn kind(&self) -> DeclarationKind {
        match self {
            DeclarationData::NamedType { .. } => DeclarationKind::NamedType,
            DeclarationData::Field { .. } => DeclarationKind::Field,
            DeclarationData::Constructor { .. } => DeclarationKind::Constructor,
            DeclarationData::Finalizer { .. } => DeclarationKind::Finalizer,
            DeclarationData::Property { .. } => DeclarationKind::Property,
            DeclarationData::Method { .. } => DeclarationKind::Method,
            DeclarationData::Event { .. } => DeclarationKind::Event,
        }
    }
}

/// A node of the symbol graph
#[derive(Debug, Clone, PartialEq)]
pub struct Declaration {
    pub id: DeclId,
    pub key: DeclarationKey,
    pub name: String,
    pub parent: Option<DeclId>,
    pub accessibility: Accessibility,
    pub is_static: bool,
    /// Base-class member this declaration overrides (`override` keyword)
    pub overridden_member: Option<DeclarationKey>,
    pub explicit_interface: Option<InterfaceImplementation>,
    /// Index into the declaring type's parts
    pub part: usize,
    pub data: DeclarationData,
}

impl Declaration {
    pub fn kind(&self) -> DeclarationKind {
        self.data.kind()
    }

    pub fn method_role(&self) -> Option<MethodRole> {
        match &self.data {
            DeclarationData::Method { role, .. } => Some(*role),
            _ => None,
        }
    }

    pub fn is_accessor(&self) -> bool {
        self.method_role().is_some_and(MethodRole::is_accessor)
    }

    pub fn parameters(&self) -> &[Parameter] {
        match &self.data {
            DeclarationData::Method { parameters, .. } | DeclarationData::Constructor { parameters, .. } => parameters,
            _ => &[],
        }
    }

    /// Return type of a method, type of a property/event/field
    pub fn value_type(&self) -> Option<&str> {
        match &self.data {
            DeclarationData::Method { return_type, .. } => Some(return_type),
            DeclarationData::Property { ty, .. } | DeclarationData::Event { ty, .. } | DeclarationData::Field { ty, .. } => Some(ty),
            _ => None,
        }
    }

    pub fn returns_void(&self) -> bool {
        match &self.data {
            DeclarationData::Method { return_type, .. } => return_type == "void",
            _ => true,
        }
    }

    pub fn body(&self) -> Option<&Block> {
        match &self.data {
            DeclarationData::Method { body, .. } => body.as_ref(),
            DeclarationData::Constructor { body, .. } | DeclarationData::Finalizer { body } => Some(body),
            _ => None,
        }
    }

    /// Accessor declarations of a property or event, in declaration order
    pub fn accessors(&self) -> Vec<DeclId> {
        match &self.data {
            DeclarationData::Property { getter, setter, .. } => getter.iter().chain(setter.iter()).copied().collect(),
            DeclarationData::Event { adder, remover, .. } => adder.iter().chain(remover.iter()).copied().collect(),
            _ => Vec::new(),
        }
    }

    /// Minimally-qualified signature, used to disambiguate overloads
    pub fn signature(&self) -> String {
        match &self.data {
            DeclarationData::Method { parameters, .. } | DeclarationData::Constructor { parameters, .. } => {
                let parameter_types: Vec<&str> = parameters.iter().map(|p| p.ty.as_str()).collect();
                format!("{}({})", self.name, parameter_types.join(", "))
            }
            _ => self.name.clone(),
        }
    }
}
