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

//! Serialisable compilation model handed over by the compiler front end

use super::declaration::{Accessibility, ConstructorInitializer, Parameter, TypeKind};
use crate::syntax::ast::{Block, Expr};
use serde::{Deserialize, Serialize};

fn default_class() -> TypeKind {
    TypeKind::Class
}

fn default_public() -> Accessibility {
    Accessibility::Public
}

fn default_private() -> Accessibility {
    Accessibility::Private
}

/// Every type of one compilation snapshot
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompilationModel {
    #[serde(default)]
    pub types: Vec<TypeModel>,
}

impl CompilationModel {
    pub fn new(types: Vec<TypeModel>) -> Self {
        Self { types }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeModel {
    pub name: String,
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default = "default_class")]
    pub kind: TypeKind,
    #[serde(default = "default_public")]
    pub accessibility: Accessibility,
    #[serde(default)]
    pub is_static: bool,
    /// Files declaring the type; more than one for partial types. Nested types inherit the
    /// file of the enclosing part.
    #[serde(default)]
    pub parts: Vec<String>,
    /// Part of the enclosing type declaring a nested type
    #[serde(default)]
    pub part: usize,
    #[serde(default)]
    pub base_types: Vec<String>,
    #[serde(default)]
    pub members: Vec<MemberModel>,
    #[serde(default)]
    pub nested: Vec<TypeModel>,
}

impl TypeModel {
    pub fn class(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: None,
            kind: TypeKind::Class,
            accessibility: Accessibility::Public,
            is_static: false,
            parts: vec![path.into()],
            part: 0,
            base_types: Vec::new(),
            members: Vec::new(),
            nested: Vec::new(),
        }
    }

    pub fn in_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn with_part(mut self, path: impl Into<String>) -> Self {
        self.parts.push(path.into());
        self
    }

    pub fn with_base_type(mut self, base: impl Into<String>) -> Self {
        self.base_types.push(base.into());
        self
    }

    pub fn with_member(mut self, member: MemberModel) -> Self {
        self.members.push(member);
        self
    }

    pub fn with_nested(mut self, nested: TypeModel) -> Self {
        self.nested.push(nested);
        self
    }
}

/// Body of one property or event accessor; `None` means compiler-generated
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AccessorModel {
    #[serde(default)]
    pub body: Option<Block>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventAccessorsModel {
    pub add: Block,
    pub remove: Block,
}

/// Kind-specific part of a member
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MemberKindModel {
    Field {
        ty: String,
        #[serde(default)]
        initializer: Option<Expr>,
    },
    Method {
        return_type: String,
        #[serde(default)]
        parameters: Vec<Parameter>,
        #[serde(default)]
        body: Option<Block>,
    },
    Constructor {
        #[serde(default)]
        parameters: Vec<Parameter>,
        #[serde(default)]
        initializer: Option<ConstructorInitializer>,
        #[serde(default)]
        body: Block,
    },
    Finalizer {
        #[serde(default)]
        body: Block,
    },
    Property {
        ty: String,
        #[serde(default)]
        getter: Option<AccessorModel>,
        #[serde(default)]
        setter: Option<AccessorModel>,
        #[serde(default)]
        initializer: Option<Expr>,
    },
    Event {
        ty: String,
        /// `None` for a field-like event
        #[serde(default)]
        accessors: Option<EventAccessorsModel>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberModel {
    /// Ignored for constructors and finalizers, which take the type's name
    #[serde(default)]
    pub name: String,
    #[serde(default = "default_private")]
    pub accessibility: Accessibility,
    #[serde(default)]
    pub is_static: bool,
    #[serde(default)]
    pub part: usize,
    /// Key of the base-class member this member overrides
    #[serde(default)]
    pub overrides: Option<String>,
    /// Interface this member implements explicitly
    #[serde(default)]
    pub explicit_interface: Option<String>,
    #[serde(flatten)]
    pub kind: MemberKindModel,
}

impl MemberModel {
    fn new(name: impl Into<String>, kind: MemberKindModel) -> Self {
        Self {
            name: name.into(),
            accessibility: Accessibility::Private,
            is_static: false,
            part: 0,
            overrides: None,
            explicit_interface: None,
            kind,
        }
    }

    pub fn field(name: impl Into<String>, ty: impl Into<String>) -> Self {
        Self::new(name, MemberKindModel::Field { ty: ty.into(), initializer: None })
    }

    pub fn method(name: impl Into<String>, return_type: impl Into<String>, parameters: Vec<Parameter>, body: Block) -> Self {
        Self::new(
            name,
            MemberKindModel::Method {
                return_type: return_type.into(),
                parameters,
                body: Some(body),
            },
        )
    }

    pub fn constructor(parameters: Vec<Parameter>, body: Block) -> Self {
        Self::new(
            String::new(),
            MemberKindModel::Constructor {
                parameters,
                initializer: None,
                body,
            },
        )
    }

    pub fn auto_property(name: impl Into<String>, ty: impl Into<String>) -> Self {
        Self::new(
            name,
            MemberKindModel::Property {
                ty: ty.into(),
                getter: Some(AccessorModel::default()),
                setter: Some(AccessorModel::default()),
                initializer: None,
            },
        )
    }

    pub fn property(name: impl Into<String>, ty: impl Into<String>, getter: Option<Block>, setter: Option<Block>) -> Self {
        Self::new(
            name,
            MemberKindModel::Property {
                ty: ty.into(),
                getter: getter.map(|body| AccessorModel { body: Some(body) }),
                setter: setter.map(|body| AccessorModel { body: Some(body) }),
                initializer: None,
            },
        )
    }

    pub fn field_event(name: impl Into<String>, ty: impl Into<String>) -> Self {
        Self::new(name, MemberKindModel::Event { ty: ty.into(), accessors: None })
    }

    pub fn event(name: impl Into<String>, ty: impl Into<String>, add: Block, remove: Block) -> Self {
        Self::new(
            name,
            MemberKindModel::Event {
                ty: ty.into(),
                accessors: Some(EventAccessorsModel { add, remove }),
            },
        )
    }

    pub fn with_accessibility(mut self, accessibility: Accessibility) -> Self {
        self.accessibility = accessibility;
        self
    }

    pub fn public(self) -> Self {
        self.with_accessibility(Accessibility::Public)
    }

    pub fn static_member(mut self) -> Self {
        self.is_static = true;
        self
    }

    pub fn in_part(mut self, part: usize) -> Self {
        self.part = part;
        self
    }

    pub fn overriding(mut self, base_member: impl Into<String>) -> Self {
        self.overrides = Some(base_member.into());
        self
    }

    pub fn implementing(mut self, interface: impl Into<String>) -> Self {
        self.explicit_interface = Some(interface.into());
        self
    }

    pub fn with_initializer(mut self, value: Expr) -> Self {
        match &mut self.kind {
            MemberKindModel::Field { initializer, .. } | MemberKindModel::Property { initializer, .. } => *initializer = Some(value),
            _ => {}
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_member_json_is_flattened() {
        let json = r#"{
            "name": "Foo",
            "accessibility": "public",
            "kind": "method",
            "return_type": "void",
            "body": { "statements": [] }
        }"#;
        let member: MemberModel = serde_json::from_str(json).unwrap();
        assert_eq!(member.name, "Foo");
        assert_eq!(member.accessibility, Accessibility::Public);
        assert!(matches!(member.kind, MemberKindModel::Method { ref return_type, .. } if return_type == "void"));
    }

    #[test]
    fn test_type_defaults() {
        let model: TypeModel = serde_json::from_str(r#"{ "name": "C", "parts": ["C.cs"] }"#).unwrap();
        assert_eq!(model.kind, TypeKind::Class);
        assert_eq!(model.accessibility, Accessibility::Public);
        assert!(model.members.is_empty());
    }
}
