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

//! Introduction step
//!
//! Applies every transformation to an extension of the source graph, producing the intermediate
//! graph (source plus introduced declarations) and the frozen [`IntroductionRegistry`].

use super::insert_position::InsertPosition;
use super::introduced_member::LinkerNodeId;
use super::registry::IntroductionRegistry;
use super::transformation::{MemberFlags, MemberTemplate, Transformation};
use crate::config::LinkerConfig;
use crate::diagnostics::{Diagnostic, DiagnosticBag, DiagnosticCode};
use crate::error::{LinkerError, LinkerResult};
use crate::ordering::{AspectLayerId, LayerOrder};
use crate::pipeline::{LinkerStage, PipelineContext};
use crate::symbols::{
    AccessorModel, Accessibility, DeclId, DeclarationData, DeclarationKind, MemberModel, MethodRole, NewDeclaration, SymbolGraph,
    SymbolGraphBuilder, TypeKind, TypeModel, member_key, method_key,
};
use crate::syntax::ast::{AspectReference, AspectReferenceId, AspectReferenceOrder, AssignmentOperator, Block, Expr, ReferenceAccess, Statement};
use crate::syntax::walk;
use metrics::counter;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::{debug, info, instrument, warn};

/// Everything the later stages need from the introduction step
#[derive(Debug)]
pub struct IntroductionResult {
    /// Number of declarations that come from the source; their ids are below this bound
    pub source_len: usize,
    /// Source plus introduced declarations
    pub graph: SymbolGraph,
    pub registry: IntroductionRegistry,
    pub order: LayerOrder,
    /// Name of the emitted original body of each override target
    pub source_names: BTreeMap<DeclId, String>,
    /// Backing field created for each overridden auto-property or field-like event
    pub backing_fields: BTreeMap<DeclId, DeclId>,
    /// Members of each position, sorted; filled by the sort stage
    pub ordered: BTreeMap<InsertPosition, Vec<LinkerNodeId>>,
}

impl IntroductionResult {
    pub fn is_source(&self, id: DeclId) -> bool {
        id.index() < self.source_len
    }

    /// Sorted members placed at a position
    pub fn members_at(&self, position: &InsertPosition) -> &[LinkerNodeId] {
        self.ordered.get(position).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Builds the intermediate graph from the transformations of every layer
pub struct IntroductionStep<'a> {
    transformations: &'a [Transformation],
}

impl<'a> IntroductionStep<'a> {
    pub fn new(transformations: &'a [Transformation]) -> Self {
        Self { transformations }
    }
}

impl LinkerStage for IntroductionStep<'_> {
    type Input = (SymbolGraph, LayerOrder);
    type Output = IntroductionResult;

    fn execute(&mut self, input: Self::Input, context: &mut PipelineContext) -> LinkerResult<Self::Output> {
        let (source, order) = input;
        let mark = context.diagnostics.len();
        let result = Introducer::new(&source, &order, &context.config).run(self.transformations, &mut context.diagnostics)?;

        let errors = context.diagnostics.errors_since(mark);
        if !errors.is_empty() {
            return Err(LinkerError::Aborted {
                stage: self.name().to_string(),
                diagnostics: errors,
            });
        }

        let (graph, registry, source_names, backing_fields) = result;
        context.metrics.record_processed_items(self.name(), registry.len());
        Ok(IntroductionResult {
            source_len: source.len(),
            graph,
            registry,
            order,
            source_names,
            backing_fields,
            ordered: BTreeMap::new(),
        })
    }

    fn name(&self) -> &'static str {
        "introduction"
    }
}

type IntroducerOutput = (SymbolGraph, IntroductionRegistry, BTreeMap<DeclId, String>, BTreeMap<DeclId, DeclId>);

struct Introducer<'a> {
    order: &'a LayerOrder,
    config: &'a LinkerConfig,
    builder: SymbolGraphBuilder,
    registry: IntroductionRegistry,
    /// Member names taken in each type, including names reserved for emitted original bodies
    taken_names: HashMap<DeclId, BTreeSet<String>>,
    source_names: BTreeMap<DeclId, String>,
    backing_fields: BTreeMap<DeclId, DeclId>,
}

impl<'a> Introducer<'a> {
    fn new(source: &SymbolGraph, order: &'a LayerOrder, config: &'a LinkerConfig) -> Self {
        Self {
            order,
            config,
            builder: SymbolGraphBuilder::extend(source),
            registry: IntroductionRegistry::new(),
            taken_names: HashMap::new(),
            source_names: BTreeMap::new(),
            backing_fields: BTreeMap::new(),
        }
    }

    #[instrument(skip_all, fields(transformations = transformations.len()))]
    fn run(mut self, transformations: &[Transformation], diagnostics: &mut DiagnosticBag) -> LinkerResult<IntroducerOutput> {
        let mut schedule = Vec::with_capacity(transformations.len());
        for (index, transformation) in transformations.iter().enumerate() {
            let layer = transformation.layer();
            let layer_order = self
                .order
                .order(layer)
                .ok_or_else(|| LinkerError::invalid_model(format!("transformation {} uses unregistered layer `{}`", index, layer)))?;
            schedule.push((layer_order, index));
        }
        // Earlier layers first, so later layers can override what earlier ones introduced
        schedule.sort_unstable();

        for (layer_order, index) in schedule {
            let transformation = &transformations[index];
            debug!("Applying {} from {}", transformation.kind_name(), transformation.layer());
            self.apply(index, layer_order, transformation, diagnostics)?;
        }

        self.assign_reference_ids()?;
        self.registry.freeze();
        counter!("dotweave_introduced_members", self.registry.len() as u64);
        info!("Introduced {} members", self.registry.len());
        Ok((self.builder.build(), self.registry, self.source_names, self.backing_fields))
    }

    fn apply(&mut self, index: usize, layer_order: usize, transformation: &Transformation, diagnostics: &mut DiagnosticBag) -> LinkerResult<()> {
        match transformation {
            Transformation::OverrideMember { layer, target, template, flags } => {
                self.override_member(index, layer, layer_order, target, template, *flags, diagnostics)
            }
            Transformation::IntroduceMember { layer, container, member, flags } => {
                let Some(type_id) = self.resolve_type(container, diagnostics) else {
                    return Ok(());
                };
                self.introduce_member(index, layer, type_id, member, *flags, diagnostics)
            }
            Transformation::IntroduceType { layer, container, declaration } => {
                let container = match container {
                    Some(key) => match self.resolve_type(key, diagnostics) {
                        Some(type_id) => Some(type_id),
                        None => return Ok(()),
                    },
                    None => None,
                };
                self.introduce_type(index, layer, container, declaration, diagnostics)
            }
            Transformation::IntroduceInterface { layer, target, interface } => {
                if let Some(type_id) = self.resolve_type(target, diagnostics) {
                    self.registry
                        .add_interface(self.builder.graph(), type_id, layer.clone(), layer_order, interface.clone())?;
                }
                Ok(())
            }
            Transformation::AddInitializer {
                layer,
                target,
                initializer,
                body,
            } => {
                if let Some(type_id) = self.resolve_type(target, diagnostics) {
                    self.registry.add_initializer(type_id, layer.clone(), layer_order, *initializer, body.clone())?;
                }
                Ok(())
            }
        }
    }

    fn resolve_type(&self, key: &str, diagnostics: &mut DiagnosticBag) -> Option<DeclId> {
        let graph = self.builder.graph();
        match graph.lookup(key) {
            Some(id) if graph.get(id).kind() == DeclarationKind::NamedType => Some(id),
            _ => {
                diagnostics.push(Diagnostic::error(
                    DiagnosticCode::UnknownTarget,
                    format!("no type `{}` to transform", key),
                    Some(key.to_string()),
                ));
                None
            }
        }
    }

    /// Reserve a unique member name in a type: `base`, then `base_1`, `base_2`, ...
    fn unique_name(&mut self, type_id: DeclId, base: &str) -> String {
        let graph = self.builder.graph();
        let taken = self
            .taken_names
            .entry(type_id)
            .or_insert_with(|| graph.member_names(type_id).into_iter().map(str::to_string).collect());
        let mut candidate = base.to_string();
        let mut suffix = 1;
        while taken.contains(&candidate) {
            candidate = format!("{}_{}", base, suffix);
            suffix += 1;
        }
        taken.insert(candidate.clone());
        candidate
    }

    fn reserve_name(&mut self, type_id: DeclId, name: &str) {
        let graph = self.builder.graph();
        self.taken_names
            .entry(type_id)
            .or_insert_with(|| graph.member_names(type_id).into_iter().map(str::to_string).collect())
            .insert(name.to_string());
    }

    #[allow(clippy::too_many_arguments)]
    fn override_member(
        &mut self,
        index: usize,
        layer: &AspectLayerId,
        layer_order: usize,
        target_key: &str,
        template: &MemberTemplate,
        flags: MemberFlags,
        diagnostics: &mut DiagnosticBag,
    ) -> LinkerResult<()> {
        let graph = self.builder.graph();
        let Some(target) = graph.lookup(target_key) else {
            diagnostics.push(Diagnostic::error(
                DiagnosticCode::UnknownTarget,
                format!("`{}` overrides a declaration that does not exist", layer),
                Some(target_key.to_string()),
            ));
            return Ok(());
        };
        if let Some(reason) = self.unsupported_target(target, template) {
            diagnostics.push(Diagnostic::error(
                DiagnosticCode::UnsupportedOverrideTarget,
                format!("`{}` cannot override `{}`: {}", layer, target_key, reason),
                Some(target_key.to_string()),
            ));
            return Ok(());
        }
        if self.registry.has_override_from(target, layer) {
            diagnostics.push(Diagnostic::error(
                DiagnosticCode::ConflictingIntroduction,
                format!("`{}` overrides `{}` more than once", layer, target_key),
                Some(target_key.to_string()),
            ));
            return Ok(());
        }

        let target_declaration = graph.get(target).clone();
        let Some(type_id) = graph.declaring_type(target) else {
            return Err(LinkerError::assertion_failed("member has a declaring type", target_key.to_string()));
        };
        let type_key = graph.get(type_id).key.0.clone();
        let type_name = graph.get(type_id).name.clone();

        if !self.source_names.contains_key(&target) {
            let source_name = self.unique_name(type_id, &format!("{}_{}", target_declaration.name, self.config.source_member_suffix));
            self.source_names.insert(target, source_name);
        }
        self.prepare_original(type_id, target)?;

        let name = self.unique_name(type_id, &format!("{}_{}", target_declaration.name, layer.member_suffix()));
        let receiver = if target_declaration.is_static { Expr::type_name(type_name) } else { Expr::This };
        let base = NewDeclaration {
            key: member_key(&type_key, None, &name),
            name: name.clone(),
            parent: Some(type_id),
            accessibility: Accessibility::Private,
            is_static: target_declaration.is_static,
            overridden_member: None,
            explicit_interface: None,
            part: target_declaration.part,
            data: DeclarationData::Finalizer { body: Block::empty() },
        };

        let declaration = match (&target_declaration.data, template) {
            (
                DeclarationData::Method {
                    return_type, parameters, ..
                },
                MemberTemplate::Method { body },
            ) => self.builder.add(NewDeclaration {
                key: method_key(&type_key, None, &name, parameters),
                data: DeclarationData::Method {
                    role: MethodRole::Ordinary,
                    return_type: return_type.clone(),
                    parameters: parameters.clone(),
                    body: Some(body.clone()),
                },
                ..base
            })?,
            (DeclarationData::Property { ty, getter, setter, .. }, MemberTemplate::Property { getter: get_template, setter: set_template }) => {
                let ty = ty.clone();
                let (has_getter, has_setter) = (getter.is_some(), setter.is_some());
                let property = self.builder.add(NewDeclaration {
                    data: DeclarationData::Property {
                        ty: ty.clone(),
                        getter: None,
                        setter: None,
                        is_auto: false,
                        initializer: None,
                    },
                    ..base
                })?;
                let getter = has_getter
                    .then(|| {
                        let body = get_template.clone().unwrap_or_else(|| proceed_accessor(target_key, &receiver, MethodRole::PropertyGet));
                        self.builder.add_accessor(property, MethodRole::PropertyGet, &ty, &AccessorModel { body: Some(body) })
                    })
                    .transpose()?;
                let setter = has_setter
                    .then(|| {
                        let body = set_template.clone().unwrap_or_else(|| proceed_accessor(target_key, &receiver, MethodRole::PropertySet));
                        self.builder.add_accessor(property, MethodRole::PropertySet, &ty, &AccessorModel { body: Some(body) })
                    })
                    .transpose()?;
                self.builder.update_data(property, |data| {
                    if let DeclarationData::Property { getter: g, setter: s, .. } = data {
                        *g = getter;
                        *s = setter;
                    }
                });
                property
            }
            (DeclarationData::Event { ty, .. }, MemberTemplate::Event { add, remove }) => {
                let ty = ty.clone();
                let event = self.builder.add(NewDeclaration {
                    data: DeclarationData::Event {
                        ty: ty.clone(),
                        adder: None,
                        remover: None,
                        is_field_like: false,
                    },
                    ..base
                })?;
                let add_body = add.clone().unwrap_or_else(|| proceed_accessor(target_key, &receiver, MethodRole::EventAdd));
                let remove_body = remove.clone().unwrap_or_else(|| proceed_accessor(target_key, &receiver, MethodRole::EventRemove));
                let adder = self.builder.add_accessor(event, MethodRole::EventAdd, &ty, &AccessorModel { body: Some(add_body) })?;
                let remover = self.builder.add_accessor(event, MethodRole::EventRemove, &ty, &AccessorModel { body: Some(remove_body) })?;
                self.builder.update_data(event, |data| {
                    if let DeclarationData::Event { adder: a, remover: r, .. } = data {
                        *a = Some(adder);
                        *r = Some(remover);
                    }
                });
                event
            }
            _ => return Err(LinkerError::assertion_failed("template matches target kind", target_key.to_string())),
        };

        self.registry
            .add_override(self.builder.graph(), index, layer.clone(), layer_order, declaration, target, flags)?;
        debug!("`{}` overrides `{}` as `{}`", layer, target_key, name);
        Ok(())
    }

    /// Why `target` cannot be overridden with `template`, if it cannot
    fn unsupported_target(&self, target: DeclId, template: &MemberTemplate) -> Option<String> {
        let graph = self.builder.graph();
        let declaration = graph.get(target);
        let in_interface = graph
            .declaring_type(target)
            .is_some_and(|type_id| matches!(graph.get(type_id).data, DeclarationData::NamedType { type_kind: TypeKind::Interface, .. }));
        if in_interface {
            return Some("interface members have no body".to_string());
        }
        match (&declaration.data, template) {
            (DeclarationData::Method { role: MethodRole::Ordinary, body: Some(_), .. }, MemberTemplate::Method { .. }) => None,
            (DeclarationData::Method { role: MethodRole::Ordinary, body: None, .. }, _) => Some("the method has no body".to_string()),
            (DeclarationData::Method { .. }, _) if declaration.is_accessor() => Some("accessors are overridden through their property or event".to_string()),
            (DeclarationData::Property { setter, .. }, MemberTemplate::Property { setter: Some(_), .. }) if setter.is_none() => {
                Some("the property has no setter".to_string())
            }
            (DeclarationData::Property { getter, .. }, MemberTemplate::Property { getter: Some(_), .. }) if getter.is_none() => {
                Some("the property has no getter".to_string())
            }
            (DeclarationData::Property { .. }, MemberTemplate::Property { .. }) => None,
            (DeclarationData::Event { .. }, MemberTemplate::Event { .. }) => None,
            (data, _) if matches!(data.kind(), DeclarationKind::Method | DeclarationKind::Property | DeclarationKind::Event) => {
                Some("the template does not match the member kind".to_string())
            }
            (data, _) => Some(format!("{:?} declarations cannot be overridden", data.kind())),
        }
    }

    /// Give an auto-property or field-like event a backing field and real accessor bodies, so its
    /// original semantic has something to run
    fn prepare_original(&mut self, type_id: DeclId, target: DeclId) -> LinkerResult<()> {
        if self.backing_fields.contains_key(&target) {
            return Ok(());
        }
        let graph = self.builder.graph();
        let declaration = graph.get(target).clone();
        let (ty, initializer, accessors) = match &declaration.data {
            DeclarationData::Property {
                ty, is_auto: true, initializer, ..
            } => (ty.clone(), initializer.clone(), declaration.accessors()),
            DeclarationData::Event { ty, is_field_like: true, .. } => (ty.clone(), None, declaration.accessors()),
            _ => return Ok(()),
        };

        let type_key = graph.get(type_id).key.0.clone();
        let type_name = graph.get(type_id).name.clone();
        let field_name = self.unique_name(type_id, &backing_field_name(&declaration.name));
        let field = self.builder.add(NewDeclaration {
            key: member_key(&type_key, None, &field_name),
            name: field_name.clone(),
            parent: Some(type_id),
            accessibility: Accessibility::Private,
            is_static: declaration.is_static,
            overridden_member: None,
            explicit_interface: None,
            part: declaration.part,
            data: DeclarationData::Field { ty, initializer },
        })?;

        let receiver = if declaration.is_static { Expr::type_name(type_name) } else { Expr::This };
        let field_access = Expr::member(receiver, field_name);
        for accessor in accessors {
            let role = self.builder.graph().get(accessor).method_role();
            let statement = match role {
                Some(MethodRole::PropertyGet) => Statement::ret(Some(field_access.clone())),
                Some(MethodRole::PropertySet) => Statement::expr(Expr::assign(field_access.clone(), AssignmentOperator::Assign, Expr::ident("value"))),
                Some(MethodRole::EventAdd) => Statement::expr(Expr::assign(field_access.clone(), AssignmentOperator::AddAssign, Expr::ident("value"))),
                Some(MethodRole::EventRemove) => Statement::expr(Expr::assign(field_access.clone(), AssignmentOperator::SubtractAssign, Expr::ident("value"))),
                _ => continue,
            };
            self.builder.update_data(accessor, |data| {
                if let DeclarationData::Method { body, .. } = data {
                    *body = Some(Block::new(vec![statement]));
                }
            });
        }
        self.builder.update_data(target, |data| match data {
            DeclarationData::Property { is_auto, initializer, .. } => {
                *is_auto = false;
                *initializer = None;
            }
            DeclarationData::Event { is_field_like, .. } => *is_field_like = false,
            _ => {}
        });
        self.backing_fields.insert(target, field);
        Ok(())
    }

    fn introduce_member(
        &mut self,
        index: usize,
        layer: &AspectLayerId,
        type_id: DeclId,
        member: &MemberModel,
        flags: MemberFlags,
        diagnostics: &mut DiagnosticBag,
    ) -> LinkerResult<()> {
        let graph = self.builder.graph();
        let type_key = graph.get(type_id).key.0.clone();
        let mut member = member.clone();
        member.part = graph.primary_part(type_id);

        let mut flags = flags;
        if member.accessibility != Accessibility::Private || member.explicit_interface.is_some() {
            flags |= MemberFlags::NOT_DISCARDABLE;
        }

        let declaration = match self.builder.add_member_model(type_id, &member) {
            Ok(id) => id,
            Err(LinkerError::InvalidModel(message)) => {
                warn!("Rejected introduction into `{}`: {}", type_key, message);
                diagnostics.push(Diagnostic::error(
                    DiagnosticCode::ConflictingIntroduction,
                    format!("`{}` introduces a member that already exists in `{}`: {}", layer, type_key, message),
                    Some(type_key),
                ));
                return Ok(());
            }
            Err(other) => return Err(other),
        };
        let name = self.builder.graph().get(declaration).name.clone();
        self.reserve_name(type_id, &name);
        self.registry
            .add_member(self.builder.graph(), index, layer.clone(), declaration, Some(type_id), None, flags)?;
        debug!("`{}` introduces `{}`", layer, self.builder.graph().get(declaration).key);
        Ok(())
    }

    fn introduce_type(
        &mut self,
        index: usize,
        layer: &AspectLayerId,
        container: Option<DeclId>,
        declaration: &TypeModel,
        diagnostics: &mut DiagnosticBag,
    ) -> LinkerResult<()> {
        let mut model = declaration.clone();
        let root_unit = match container {
            Some(type_id) => {
                model.part = self.builder.graph().primary_part(type_id);
                None
            }
            None => {
                model.parts = vec![self.config.introduced_unit_path.clone()];
                Some(self.config.introduced_unit_path.clone())
            }
        };

        let type_id = match self.builder.add_type_model(&model, container) {
            Ok(id) => id,
            Err(LinkerError::InvalidModel(message)) => {
                diagnostics.push(Diagnostic::error(
                    DiagnosticCode::ConflictingIntroduction,
                    format!("`{}` introduces type `{}` that cannot be added: {}", layer, model.name, message),
                    Some(model.name.clone()),
                ));
                return Ok(());
            }
            Err(other) => return Err(other),
        };
        if let Some(container) = container {
            self.reserve_name(container, &model.name);
        }
        self.registry
            .add_member(self.builder.graph(), index, layer.clone(), type_id, container, root_unit, MemberFlags::NOT_DISCARDABLE)?;
        Ok(())
    }

    /// Number every aspect reference of the intermediate graph and of the initializers
    fn assign_reference_ids(&mut self) -> LinkerResult<()> {
        let mut next = 0u32;
        let mut number = |expr: &mut Expr| {
            if let Expr::AspectReference(reference) = expr {
                reference.id = Some(AspectReferenceId(next));
                next += 1;
            }
        };

        let ids: Vec<DeclId> = self.builder.graph().iter().filter(|d| d.body().is_some()).map(|d| d.id).collect();
        for id in ids {
            self.builder.update_data(id, |data| {
                let body = match data {
                    DeclarationData::Method { body: Some(body), .. } => body,
                    DeclarationData::Constructor { body, .. } | DeclarationData::Finalizer { body } => body,
                    _ => return,
                };
                walk::visit_expressions_mut(body, &mut number);
            });
        }
        for body in self.registry.initializer_bodies_mut()? {
            walk::visit_expressions_mut(body, &mut number);
        }
        debug!("Assigned {} aspect reference ids", next);
        Ok(())
    }
}

/// `_camelName` for a member named `Name`
fn backing_field_name(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => format!("_{}{}", first.to_lowercase(), chars.as_str()),
        None => "_value".to_string(),
    }
}

/// Accessor body that forwards to the previous layer
fn proceed_accessor(target: &str, receiver: &Expr, role: MethodRole) -> Block {
    let value = || Box::new(Expr::ident("value"));
    let access = match role {
        MethodRole::PropertyGet => ReferenceAccess::Get,
        MethodRole::PropertySet => ReferenceAccess::Set { value: value() },
        MethodRole::EventAdd => ReferenceAccess::Add { value: value() },
        MethodRole::EventRemove => ReferenceAccess::Remove { value: value() },
        MethodRole::Ordinary => ReferenceAccess::Invoke { arguments: Vec::new() },
    };
    let reference = AspectReference::new(target, AspectReferenceOrder::Base, access)
        .with_receiver(receiver.clone())
        .into_expr();
    match role {
        MethodRole::PropertyGet => Block::new(vec![Statement::ret(Some(reference))]),
        _ => Block::new(vec![Statement::expr(reference)]),
    }
}
