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

//! Immutable declaration graph of one compilation snapshot

use super::declaration::{
    Accessibility, DeclId, Declaration, DeclarationData, DeclarationKey, DeclarationKind, InterfaceImplementation, MethodRole, Parameter,
};
use super::model::{AccessorModel, CompilationModel, MemberKindModel, MemberModel, TypeModel};
use crate::error::{LinkerError, LinkerResult};
use crate::pipeline::{LinkerStage, PipelineContext};
use std::collections::HashMap;
use tracing::debug;

/// Everything needed to add a declaration except its id
#[derive(Debug, Clone)]
pub struct NewDeclaration {
    pub key: DeclarationKey,
    pub name: String,
    pub parent: Option<DeclId>,
    pub accessibility: Accessibility,
    pub is_static: bool,
    pub overridden_member: Option<DeclarationKey>,
    pub explicit_interface: Option<InterfaceImplementation>,
    pub part: usize,
    pub data: DeclarationData,
}

/// Declaration graph: parent/child, accessor, override and explicit-implementation relations
#[derive(Debug, Clone, Default)]
pub struct SymbolGraph {
    declarations: Vec<Declaration>,
    by_key: HashMap<DeclarationKey, DeclId>,
    children: Vec<Vec<DeclId>>,
    roots: Vec<DeclId>,
}

impl SymbolGraph {
    /// Adapt a front-end compilation model into a graph
    pub fn from_model(model: &CompilationModel) -> LinkerResult<Self> {
        let mut builder = SymbolGraphBuilder::new();
        for type_model in &model.types {
            builder.add_type_model(type_model, None)?;
        }
        let graph = builder.build();
        debug!("Adapted compilation model into {} declarations", graph.len());
        Ok(graph)
    }

    pub fn len(&self) -> usize {
        self.declarations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.declarations.is_empty()
    }

    pub fn get(&self, id: DeclId) -> &Declaration {
        &self.declarations[id.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = &Declaration> {
        self.declarations.iter()
    }

    pub fn lookup(&self, key: &str) -> Option<DeclId> {
        self.by_key.get(&DeclarationKey(key.to_string())).copied()
    }

    pub fn resolve(&self, key: &str) -> LinkerResult<DeclId> {
        self.lookup(key).ok_or_else(|| LinkerError::UnresolvedDeclaration(key.to_string()))
    }

    /// Top-level types in declaration order
    pub fn root_types(&self) -> &[DeclId] {
        &self.roots
    }

    /// Children in declaration order; accessors are children of their property/event
    pub fn children(&self, id: DeclId) -> &[DeclId] {
        &self.children[id.index()]
    }

    pub fn parent(&self, id: DeclId) -> Option<DeclId> {
        self.get(id).parent
    }

    /// Nearest enclosing named type; a type's own declaring type is its parent
    pub fn declaring_type(&self, id: DeclId) -> Option<DeclId> {
        let mut current = self.parent(id);
        while let Some(candidate) = current {
            if self.get(candidate).kind() == DeclarationKind::NamedType {
                return Some(candidate);
            }
            current = self.parent(candidate);
        }
        None
    }

    /// Property or event owning an accessor
    pub fn accessor_owner(&self, id: DeclId) -> Option<DeclId> {
        if self.get(id).is_accessor() { self.parent(id) } else { None }
    }

    /// Accessor of `owner` playing `role`
    pub fn accessor(&self, owner: DeclId, role: MethodRole) -> Option<DeclId> {
        match (&self.get(owner).data, role) {
            (DeclarationData::Property { getter, .. }, MethodRole::PropertyGet) => *getter,
            (DeclarationData::Property { setter, .. }, MethodRole::PropertySet) => *setter,
            (DeclarationData::Event { adder, .. }, MethodRole::EventAdd) => *adder,
            (DeclarationData::Event { remover, .. }, MethodRole::EventRemove) => *remover,
            _ => None,
        }
    }

    /// Base-class member overridden with the `override` keyword, when it is part of this graph
    pub fn overridden_member(&self, id: DeclId) -> Option<DeclId> {
        self.get(id).overridden_member.as_ref().and_then(|key| self.lookup(key.as_str()))
    }

    pub fn explicit_interface(&self, id: DeclId) -> Option<&InterfaceImplementation> {
        self.get(id).explicit_interface.as_ref()
    }

    /// File paths of a type's parts
    pub fn type_parts(&self, type_id: DeclId) -> &[String] {
        match &self.get(type_id).data {
            DeclarationData::NamedType { parts, .. } => parts,
            _ => &[],
        }
    }

    /// Part receiving additions to a partial type: shortest path, then ordinal order
    pub fn primary_part(&self, type_id: DeclId) -> usize {
        self.type_parts(type_id)
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| a.len().cmp(&b.len()).then_with(|| a.as_str().cmp(b.as_str())))
            .map(|(index, _)| index)
            .unwrap_or(0)
    }

    /// Names of every member declared directly in a type
    pub fn member_names(&self, type_id: DeclId) -> Vec<&str> {
        self.children(type_id).iter().map(|&child| self.get(child).name.as_str()).collect()
    }

    /// Find a direct child with the given signature
    pub fn find_member(&self, type_id: DeclId, signature: &str, explicit_interface: Option<&str>) -> Option<DeclId> {
        self.children(type_id).iter().copied().find(|&child| {
            let declaration = self.get(child);
            declaration.signature() == signature && declaration.explicit_interface.as_ref().map(|i| i.interface.as_str()) == explicit_interface
        })
    }
}

/// Append-only builder producing a [`SymbolGraph`]
#[derive(Debug, Default)]
pub struct SymbolGraphBuilder {
    graph: SymbolGraph,
}

impl SymbolGraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing snapshot; its ids stay valid in the extended graph
    pub fn extend(graph: &SymbolGraph) -> Self {
        Self { graph: graph.clone() }
    }

    pub fn graph(&self) -> &SymbolGraph {
        &self.graph
    }

    pub fn add(&mut self, declaration: NewDeclaration) -> LinkerResult<DeclId> {
        if self.graph.by_key.contains_key(&declaration.key) {
            return Err(LinkerError::invalid_model(format!("duplicate declaration `{}`", declaration.key)));
        }
        if let Some(parent) = declaration.parent
            && parent.index() >= self.graph.declarations.len()
        {
            return Err(LinkerError::invalid_model(format!("parent of `{}` does not exist", declaration.key)));
        }

        let id = DeclId(self.graph.declarations.len() as u32);
        self.graph.by_key.insert(declaration.key.clone(), id);
        self.graph.children.push(Vec::new());
        match declaration.parent {
            Some(parent) => self.graph.children[parent.index()].push(id),
            None => self.graph.roots.push(id),
        }
        self.graph.declarations.push(Declaration {
            id,
            key: declaration.key,
            name: declaration.name,
            parent: declaration.parent,
            accessibility: declaration.accessibility,
            is_static: declaration.is_static,
            overridden_member: declaration.overridden_member,
            explicit_interface: declaration.explicit_interface,
            part: declaration.part,
            data: declaration.data,
        });
        Ok(id)
    }

    /// Replace the payload of a declaration added earlier
    pub fn update_data(&mut self, id: DeclId, update: impl FnOnce(&mut DeclarationData)) {
        update(&mut self.graph.declarations[id.index()].data);
    }

    /// Append a base type to a type declaration
    pub fn add_base_type(&mut self, type_id: DeclId, base: String) {
        if let DeclarationData::NamedType { base_types, .. } = &mut self.graph.declarations[type_id.index()].data
            && !base_types.contains(&base)
        {
            base_types.push(base);
        }
    }

    pub fn build(self) -> SymbolGraph {
        self.graph
    }

    pub(crate) fn add_type_model(&mut self, model: &TypeModel, parent: Option<DeclId>) -> LinkerResult<DeclId> {
        let (key, parts) = match parent {
            Some(parent_id) => {
                let enclosing = self.graph.get(parent_id);
                let enclosing_parts = self.graph.type_parts(parent_id);
                let path = enclosing_parts
                    .get(model.part)
                    .cloned()
                    .ok_or_else(|| LinkerError::invalid_model(format!("nested type `{}` refers to missing part {}", model.name, model.part)))?;
                (format!("{}.{}", enclosing.key, model.name), vec![path])
            }
            None => {
                if model.parts.is_empty() {
                    return Err(LinkerError::invalid_model(format!("type `{}` has no parts", model.name)));
                }
                let key = match &model.namespace {
                    Some(namespace) => format!("{}.{}", namespace, model.name),
                    None => model.name.clone(),
                };
                (key, model.parts.clone())
            }
        };

        let type_id = self.add(NewDeclaration {
            key: DeclarationKey(key),
            name: model.name.clone(),
            parent,
            accessibility: model.accessibility,
            is_static: model.is_static,
            overridden_member: None,
            explicit_interface: None,
            part: if parent.is_some() { model.part } else { 0 },
            data: DeclarationData::NamedType {
                type_kind: model.kind,
                namespace: if parent.is_none() { model.namespace.clone() } else { None },
                parts,
                base_types: model.base_types.clone(),
            },
        })?;

        for member in &model.members {
            self.add_member_model(type_id, member)?;
        }
        for nested in &model.nested {
            self.add_type_model(nested, Some(type_id))?;
        }
        Ok(type_id)
    }

    pub(crate) fn add_member_model(&mut self, type_id: DeclId, member: &MemberModel) -> LinkerResult<DeclId> {
        let type_declaration = self.graph.get(type_id);
        let type_key = type_declaration.key.0.clone();
        let type_name = type_declaration.name.clone();
        let part_count = self.graph.type_parts(type_id).len();
        if member.part >= part_count {
            return Err(LinkerError::invalid_model(format!("member `{}` of `{}` refers to missing part {}", member.name, type_key, member.part)));
        }

        let explicit_interface = member.explicit_interface.clone().map(|interface| InterfaceImplementation { interface });
        let base = NewDeclaration {
            key: DeclarationKey(String::new()),
            name: member.name.clone(),
            parent: Some(type_id),
            accessibility: member.accessibility,
            is_static: member.is_static,
            overridden_member: member.overrides.clone().map(DeclarationKey),
            explicit_interface: explicit_interface.clone(),
            part: member.part,
            data: DeclarationData::Finalizer { body: Default::default() },
        };
        let interface = explicit_interface.as_ref().map(|i| i.interface.as_str());

        match &member.kind {
            MemberKindModel::Field { ty, initializer } => self.add(NewDeclaration {
                key: member_key(&type_key, interface, &member.name),
                data: DeclarationData::Field {
                    ty: ty.clone(),
                    initializer: initializer.clone(),
                },
                ..base
            }),
            MemberKindModel::Method { return_type, parameters, body } => self.add(NewDeclaration {
                key: method_key(&type_key, interface, &member.name, parameters),
                data: DeclarationData::Method {
                    role: MethodRole::Ordinary,
                    return_type: return_type.clone(),
                    parameters: parameters.clone(),
                    body: body.clone(),
                },
                ..base
            }),
            MemberKindModel::Constructor { parameters, initializer, body } => {
                let marker = if member.is_static { ".cctor" } else { ".ctor" };
                self.add(NewDeclaration {
                    key: method_key(&type_key, None, marker, parameters),
                    name: type_name,
                    data: DeclarationData::Constructor {
                        parameters: parameters.clone(),
                        initializer: initializer.clone(),
                        body: body.clone(),
                    },
                    ..base
                })
            }
            MemberKindModel::Finalizer { body } => self.add(NewDeclaration {
                key: DeclarationKey(format!("{}.~{}()", type_key, type_name)),
                name: type_name,
                data: DeclarationData::Finalizer { body: body.clone() },
                ..base
            }),
            MemberKindModel::Property {
                ty,
                getter,
                setter,
                initializer,
            } => {
                let is_auto = getter.iter().chain(setter.iter()).all(|accessor| accessor.body.is_none());
                let property_id = self.add(NewDeclaration {
                    key: member_key(&type_key, interface, &member.name),
                    data: DeclarationData::Property {
                        ty: ty.clone(),
                        getter: None,
                        setter: None,
                        is_auto,
                        initializer: initializer.clone(),
                    },
                    ..base
                })?;
                let getter_id = getter
                    .as_ref()
                    .map(|accessor| self.add_accessor(property_id, MethodRole::PropertyGet, ty, accessor))
                    .transpose()?;
                let setter_id = setter
                    .as_ref()
                    .map(|accessor| self.add_accessor(property_id, MethodRole::PropertySet, ty, accessor))
                    .transpose()?;
                self.update_data(property_id, |data| {
                    if let DeclarationData::Property { getter, setter, .. } = data {
                        *getter = getter_id;
                        *setter = setter_id;
                    }
                });
                Ok(property_id)
            }
            MemberKindModel::Event { ty, accessors } => {
                let event_id = self.add(NewDeclaration {
                    key: member_key(&type_key, interface, &member.name),
                    data: DeclarationData::Event {
                        ty: ty.clone(),
                        adder: None,
                        remover: None,
                        is_field_like: accessors.is_none(),
                    },
                    ..base
                })?;
                let (add_body, remove_body) = match accessors {
                    Some(accessors) => (Some(accessors.add.clone()), Some(accessors.remove.clone())),
                    None => (None, None),
                };
                let adder = self.add_accessor(event_id, MethodRole::EventAdd, ty, &AccessorModel { body: add_body })?;
                let remover = self.add_accessor(event_id, MethodRole::EventRemove, ty, &AccessorModel { body: remove_body })?;
                self.update_data(event_id, |data| {
                    if let DeclarationData::Event { adder: a, remover: r, .. } = data {
                        *a = Some(adder);
                        *r = Some(remover);
                    }
                });
                Ok(event_id)
            }
        }
    }

    /// Add the accessor method of a property or event
    pub fn add_accessor(&mut self, owner: DeclId, role: MethodRole, value_type: &str, accessor: &AccessorModel) -> LinkerResult<DeclId> {
        let owner_declaration = self.graph.get(owner).clone();
        let keyword = role.accessor_keyword().ok_or_else(|| LinkerError::assertion_failed("accessor role", format!("{:?} is not an accessor", role)))?;
        let (return_type, parameters) = match role {
            MethodRole::PropertyGet => (value_type.to_string(), Vec::new()),
            _ => ("void".to_string(), vec![Parameter::new("value", value_type)]),
        };
        self.add(NewDeclaration {
            key: DeclarationKey(format!("{}.{}", owner_declaration.key, keyword)),
            name: format!("{}_{}", keyword, owner_declaration.name),
            parent: Some(owner),
            accessibility: owner_declaration.accessibility,
            is_static: owner_declaration.is_static,
            overridden_member: owner_declaration.overridden_member.as_ref().map(|key| DeclarationKey(format!("{}.{}", key, keyword))),
            explicit_interface: owner_declaration.explicit_interface.clone(),
            part: owner_declaration.part,
            data: DeclarationData::Method {
                role,
                return_type,
                parameters,
                body: accessor.body.clone(),
            },
        })
    }
}

/// Key of a field, property or event
pub fn member_key(type_key: &str, explicit_interface: Option<&str>, name: &str) -> DeclarationKey {
    match explicit_interface {
        Some(interface) => DeclarationKey(format!("{}.{}.{}", type_key, interface, name)),
        None => DeclarationKey(format!("{}.{}", type_key, name)),
    }
}

/// Key of a method or constructor
pub fn method_key(type_key: &str, explicit_interface: Option<&str>, name: &str, parameters: &[Parameter]) -> DeclarationKey {
    let parameter_types: Vec<&str> = parameters.iter().map(|p| p.ty.as_str()).collect();
    let signature = format!("{}({})", name, parameter_types.join(","));
    member_key(type_key, explicit_interface, &signature)
}

/// Adaptation stage: the front-end model as a symbol graph
pub struct AdaptStep;

impl LinkerStage for AdaptStep {
    type Input = CompilationModel;
    type Output = SymbolGraph;

    fn execute(&mut self, model: Self::Input, context: &mut PipelineContext) -> LinkerResult<Self::Output> {
        let graph = SymbolGraph::from_model(&model)?;
        context.metrics.record_processed_items(self.name(), graph.len());
        Ok(graph)
    }

    fn name(&self) -> &'static str {
        "adaptation"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbols::model::{MemberModel, TypeModel};
    use crate::syntax::ast::Block;

    fn sample_model() -> CompilationModel {
        CompilationModel::new(vec![
            TypeModel::class("Calculator", "src/Calculator.cs")
                .in_namespace("Demo")
                .with_part("src/generated/Calculator.Part.cs")
                .with_member(MemberModel::method("Add", "int", vec![Parameter::new("a", "int"), Parameter::new("b", "int")], Block::empty()).public())
                .with_member(MemberModel::auto_property("Total", "int").public())
                .with_member(MemberModel::field_event("Changed", "EventHandler").public().in_part(1))
                .with_nested(TypeModel::class("Inner", "ignored.cs")),
        ])
    }

    #[test]
    fn test_keys_and_relations() {
        let graph = SymbolGraph::from_model(&sample_model()).unwrap();
        let type_id = graph.resolve("Demo.Calculator").unwrap();
        let add = graph.resolve("Demo.Calculator.Add(int,int)").unwrap();
        let total = graph.resolve("Demo.Calculator.Total").unwrap();
        let getter = graph.resolve("Demo.Calculator.Total.get").unwrap();

        assert_eq!(graph.parent(add), Some(type_id));
        assert_eq!(graph.declaring_type(getter), Some(type_id));
        assert_eq!(graph.accessor_owner(getter), Some(total));
        assert_eq!(graph.accessor(total, MethodRole::PropertyGet), Some(getter));
        assert_eq!(graph.get(getter).name, "get_Total");
        assert!(matches!(graph.get(total).data, DeclarationData::Property { is_auto: true, .. }));
        assert!(graph.lookup("Demo.Calculator.Inner").is_some());
    }

    #[test]
    fn test_field_like_event_has_accessors() {
        let graph = SymbolGraph::from_model(&sample_model()).unwrap();
        let event = graph.resolve("Demo.Calculator.Changed").unwrap();
        assert_eq!(graph.get(event).accessors().len(), 2);
        assert_eq!(graph.get(event).part, 1);
    }

    #[test]
    fn test_primary_part_prefers_shortest_path() {
        let graph = SymbolGraph::from_model(&sample_model()).unwrap();
        let type_id = graph.resolve("Demo.Calculator").unwrap();
        assert_eq!(graph.primary_part(type_id), 0);
    }

    #[test]
    fn test_duplicate_member_rejected() {
        let model = CompilationModel::new(vec![
            TypeModel::class("C", "C.cs")
                .with_member(MemberModel::field("x", "int"))
                .with_member(MemberModel::field("x", "int")),
        ]);
        assert!(matches!(SymbolGraph::from_model(&model), Err(LinkerError::InvalidModel(_))));
    }

    #[test]
    fn test_missing_part_rejected() {
        let model = CompilationModel::new(vec![TypeModel::class("C", "C.cs").with_member(MemberModel::field("x", "int").in_part(3))]);
        assert!(SymbolGraph::from_model(&model).is_err());
    }

    #[test]
    fn test_extended_graph_keeps_ids() {
        let graph = SymbolGraph::from_model(&sample_model()).unwrap();
        let add = graph.resolve("Demo.Calculator.Add(int,int)").unwrap();
        let builder = SymbolGraphBuilder::extend(&graph);
        let extended = builder.build();
        assert_eq!(extended.get(add).key, graph.get(add).key);
        assert_eq!(extended.len(), graph.len());
    }
}
