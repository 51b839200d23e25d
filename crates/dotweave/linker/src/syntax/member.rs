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

//! Emitted declarations: the shape of the linker's output units

use super::ast::{Block, Expr};
use crate::symbols::{Accessibility, ConstructorInitializer, Parameter, TypeKind};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberModifiers {
    pub is_static: bool,
    pub is_override: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessorKind {
    Get,
    Set,
    Add,
    Remove,
}

impl AccessorKind {
    pub fn keyword(self) -> &'static str {
        match self {
            AccessorKind::Get => "get",
            AccessorKind::Set => "set",
            AccessorKind::Add => "add",
            AccessorKind::Remove => "remove",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessorSyntax {
    pub kind: AccessorKind,
    /// `None` for an auto accessor
    pub body: Option<Block>,
}

/// One emitted member
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "member", rename_all = "snake_case")]
pub enum MemberSyntax {
    Field {
        accessibility: Accessibility,
        modifiers: MemberModifiers,
        ty: String,
        name: String,
        initializer: Option<Expr>,
    },
    Method {
        accessibility: Accessibility,
        modifiers: MemberModifiers,
        return_type: String,
        name: String,
        explicit_interface: Option<String>,
        parameters: Vec<Parameter>,
        body: Option<Block>,
    },
    Constructor {
        accessibility: Accessibility,
        modifiers: MemberModifiers,
        name: String,
        parameters: Vec<Parameter>,
        initializer: Option<ConstructorInitializer>,
        body: Block,
    },
    Finalizer {
        name: String,
        body: Block,
    },
    Property {
        accessibility: Accessibility,
        modifiers: MemberModifiers,
        ty: String,
        name: String,
        explicit_interface: Option<String>,
        accessors: Vec<AccessorSyntax>,
        initializer: Option<Expr>,
    },
    Event {
        accessibility: Accessibility,
        modifiers: MemberModifiers,
        ty: String,
        name: String,
        explicit_interface: Option<String>,
        /// `None` for a field-like event
        accessors: Option<Vec<AccessorSyntax>>,
    },
    Type(TypeSyntax),
}

impl MemberSyntax {
    pub fn name(&self) -> &str {
        match self {
            MemberSyntax::Field { name, .. }
            | MemberSyntax::Method { name, .. }
            | MemberSyntax::Constructor { name, .. }
            | MemberSyntax::Finalizer { name, .. }
            | MemberSyntax::Property { name, .. }
            | MemberSyntax::Event { name, .. } => name,
            MemberSyntax::Type(type_syntax) => &type_syntax.name,
        }
    }

    /// Every body held by the member, nested types included
    pub fn bodies_mut(&mut self) -> Vec<&mut Block> {
        match self {
            MemberSyntax::Field { .. } => Vec::new(),
            MemberSyntax::Method { body, .. } => body.iter_mut().collect(),
            MemberSyntax::Constructor { body, .. } | MemberSyntax::Finalizer { body, .. } => vec![body],
            MemberSyntax::Property { accessors, .. } => accessors.iter_mut().filter_map(|a| a.body.as_mut()).collect(),
            MemberSyntax::Event { accessors, .. } => accessors.iter_mut().flatten().filter_map(|a| a.body.as_mut()).collect(),
            MemberSyntax::Type(type_syntax) => type_syntax.members.iter_mut().flat_map(MemberSyntax::bodies_mut).collect(),
        }
    }
}

/// One part of a type declaration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeSyntax {
    pub namespace: Option<String>,
    pub accessibility: Accessibility,
    pub is_static: bool,
    pub is_partial: bool,
    pub kind: TypeKind,
    pub name: String,
    pub base_list: Vec<String>,
    pub members: Vec<MemberSyntax>,
}

/// A file of linked output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyntaxUnit {
    pub path: String,
    pub types: Vec<TypeSyntax>,
}

impl SyntaxUnit {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            types: Vec::new(),
        }
    }

    /// Render the unit as source text
    pub fn to_source(&self) -> String {
        super::printer::print_unit(self)
    }

    pub fn bodies_mut(&mut self) -> Vec<&mut Block> {
        self.types.iter_mut().flat_map(|t| t.members.iter_mut()).flat_map(MemberSyntax::bodies_mut).collect()
    }

    /// Find a member by name in a type of this unit, searching nested types
    pub fn find_member(&self, type_name: &str, member_name: &str) -> Option<&MemberSyntax> {
        fn search<'a>(types: &'a [TypeSyntax], type_name: &str, member_name: &str) -> Option<&'a MemberSyntax> {
            for type_syntax in types {
                if type_syntax.name == type_name
                    && let Some(member) = type_syntax.members.iter().find(|m| m.name() == member_name)
                {
                    return Some(member);
                }
                for member in &type_syntax.members {
                    if let MemberSyntax::Type(nested) = member
                        && let Some(found) = search(std::slice::from_ref(nested), type_name, member_name)
                    {
                        return Some(found);
                    }
                }
            }
            None
        }
        search(&self.types, type_name, member_name)
    }
}
