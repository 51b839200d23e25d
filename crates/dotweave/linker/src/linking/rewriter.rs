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

//! Emission of linked syntax units
//!
//! Source types are emitted part by part in their original files. Each overridden member is
//! followed by the helper members its chain still needs, and introduced members land at the end
//! of the primary part of their type.

use super::body::{BodyLinker, BodyOwner};
use super::inliner::{self, InliningScope};
use crate::analysis::{AnalysisRegistry, IntermediateSymbolSemantic, SemanticKind};
use crate::error::{LinkerError, LinkerResult};
use crate::injection::{InitializerKind, InsertPosition, IntroducedMember};
use crate::symbols::{Accessibility, ConstructorInitializerKind, DeclId, Declaration, DeclarationData, DeclarationKind, MethodRole};
use crate::syntax::ast::{Block, Statement};
use crate::syntax::member::{AccessorKind, AccessorSyntax, MemberModifiers, MemberSyntax, SyntaxUnit, TypeSyntax};
use std::collections::{BTreeSet, HashMap};
use tracing::{debug, instrument};

/// Which version of a member is being emitted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Emission {
    /// The member as declared, with its own body
    Plain,
    /// An overridden member under its own name, dispatching to the last override
    Final,
    /// A private member carrying one semantic of a chain
    Helper(SemanticKind),
}

pub struct UnitEmitter<'a> {
    analysis: &'a AnalysisRegistry,
    linker: BodyLinker<'a>,
    backing_fields: BTreeSet<DeclId>,
}

impl<'a> UnitEmitter<'a> {
    pub fn new(analysis: &'a AnalysisRegistry) -> Self {
        Self {
            analysis,
            linker: BodyLinker::new(analysis),
            backing_fields: analysis.introduction.backing_fields.values().copied().collect(),
        }
    }

    /// Every output unit: source files in first-appearance order, then units of introduced types
    #[instrument(skip_all)]
    pub fn emit(&mut self) -> LinkerResult<Vec<SyntaxUnit>> {
        let analysis = self.analysis;
        let introduction = &analysis.introduction;
        let graph = &introduction.graph;
        let mut units: Vec<SyntaxUnit> = Vec::new();
        let mut by_path: HashMap<String, usize> = HashMap::new();
        let mut unit_for = |units: &mut Vec<SyntaxUnit>, path: &str| -> usize {
            *by_path.entry(path.to_string()).or_insert_with(|| {
                units.push(SyntaxUnit::new(path));
                units.len() - 1
            })
        };

        for &type_id in graph.root_types().iter().filter(|&&id| introduction.is_source(id)) {
            for (part, path) in graph.type_parts(type_id).iter().enumerate() {
                let type_syntax = self.emit_type(type_id, part)?;
                let index = unit_for(&mut units, path);
                units[index].types.push(type_syntax);
            }
        }

        for (position, members) in &introduction.ordered {
            let InsertPosition::Root { unit } = position else {
                continue;
            };
            for &id in members {
                let member = introduction.registry.get(id);
                if analysis.is_excluded(member.declaration) {
                    continue;
                }
                let type_syntax = self.emit_type(member.declaration, 0)?;
                let index = unit_for(&mut units, unit.as_str());
                units[index].types.push(type_syntax);
            }
        }
        debug!("Emitted {} units", units.len());
        Ok(units)
    }

    fn emit_type(&mut self, type_id: DeclId, part: usize) -> LinkerResult<TypeSyntax> {
        let analysis = self.analysis;
        let introduction = &analysis.introduction;
        let graph = &introduction.graph;
        let declaration = graph.get(type_id);
        let DeclarationData::NamedType {
            type_kind,
            namespace,
            parts,
            base_types,
        } = &declaration.data
        else {
            return Err(LinkerError::assertion_failed("emitted types are named types", declaration.key.to_string()));
        };
        let is_primary = part == graph.primary_part(type_id);

        let mut base_list = Vec::new();
        if is_primary {
            base_list.extend(base_types.iter().cloned());
            for addition in introduction.registry.interface_additions(type_id) {
                if !base_list.contains(&addition.interface) {
                    base_list.push(addition.interface.clone());
                }
            }
        }

        let mut members = Vec::new();
        // Registry members are placed by position and backing fields next to their property
        for &child in graph.children(type_id) {
            let placed = introduction.registry.member_of(graph, child).is_some() || self.backing_fields.contains(&child);
            if graph.get(child).part == part && !placed {
                self.emit_chain(child, &mut members)?;
            }
        }
        if is_primary {
            for &id in introduction.members_at(&InsertPosition::Within { type_id, part }) {
                self.emit_introduced(introduction.registry.get(id), &mut members)?;
            }
            self.synthesise_constructors(type_id, &mut members)?;
        }

        Ok(TypeSyntax {
            namespace: namespace.clone(),
            accessibility: declaration.accessibility,
            is_static: declaration.is_static,
            is_partial: parts.len() > 1,
            kind: *type_kind,
            name: declaration.name.clone(),
            base_list,
            members,
        })
    }

    fn emit_introduced(&mut self, member: &IntroducedMember, members: &mut Vec<MemberSyntax>) -> LinkerResult<()> {
        let analysis = self.analysis;
        let declaration = member.declaration;
        let kind = analysis.introduction.graph.get(declaration).kind();
        let has_semantics = matches!(kind, DeclarationKind::Method | DeclarationKind::Property | DeclarationKind::Event);
        let discarded = has_semantics
            && !analysis.introduction.registry.is_override_target(declaration)
            && !analysis.needs_emission(declaration, SemanticKind::Default);
        if discarded {
            debug!("Discarding unreachable `{}`", analysis.introduction.graph.get(declaration).key);
            return Ok(());
        }
        self.emit_chain(declaration, members)
    }

    /// A member and, when it is overridden, its backing field, source body and overrides
    fn emit_chain(&mut self, member: DeclId, members: &mut Vec<MemberSyntax>) -> LinkerResult<()> {
        let analysis = self.analysis;
        let introduction = &analysis.introduction;
        if analysis.is_excluded(member) {
            return Ok(());
        }
        if !introduction.registry.is_override_target(member) {
            members.push(self.emit_member(member, Emission::Plain)?);
            return Ok(());
        }

        if let Some(&field) = introduction.backing_fields.get(&member) {
            members.push(self.emit_member(field, Emission::Plain)?);
        }
        members.push(self.emit_member(member, Emission::Final)?);
        let base_kind = chain_base_kind(analysis, member);
        if analysis.needs_emission(member, base_kind) {
            members.push(self.emit_member(member, Emission::Helper(base_kind))?);
        }
        for &id in introduction.members_at(&InsertPosition::After { declaration: member }) {
            let layer = introduction.registry.get(id).declaration;
            if analysis.needs_emission(layer, SemanticKind::Default) {
                members.push(self.emit_member(layer, Emission::Helper(SemanticKind::Default))?);
            }
        }
        Ok(())
    }

    fn emit_member(&mut self, id: DeclId, emission: Emission) -> LinkerResult<MemberSyntax> {
        let analysis = self.analysis;
        let graph = &analysis.introduction.graph;
        let declaration = graph.get(id);
        let helper = matches!(emission, Emission::Helper(_));
        let kind = match emission {
            Emission::Plain => chain_base_kind(analysis, id),
            Emission::Final => SemanticKind::Final,
            Emission::Helper(kind) => kind,
        };
        let name = match declaration.kind() {
            DeclarationKind::Method | DeclarationKind::Property | DeclarationKind::Event => {
                self.linker.emitted_name(IntermediateSymbolSemantic::new(id, kind))?
            }
            _ => declaration.name.clone(),
        };
        let accessibility = if helper { Accessibility::Private } else { declaration.accessibility };
        let modifiers = MemberModifiers {
            is_static: declaration.is_static,
            is_override: !helper && declaration.overridden_member.is_some(),
        };
        let explicit_interface = if helper {
            None
        } else {
            declaration.explicit_interface.as_ref().map(|i| i.interface.clone())
        };

        let member = match &declaration.data {
            DeclarationData::NamedType { .. } => MemberSyntax::Type(self.emit_type(id, 0)?),
            DeclarationData::Field { ty, initializer } => MemberSyntax::Field {
                accessibility,
                modifiers,
                ty: ty.clone(),
                name,
                initializer: initializer.clone(),
            },
            DeclarationData::Method {
                return_type, parameters, ..
            } => MemberSyntax::Method {
                accessibility,
                modifiers,
                return_type: return_type.clone(),
                name,
                explicit_interface,
                parameters: parameters.clone(),
                body: self.body_of(id, kind)?,
            },
            DeclarationData::Constructor {
                parameters,
                initializer,
                body,
            } => {
                let mut scope = InliningScope::new(parameters, Some(body));
                let chained = initializer.as_ref().is_some_and(|i| i.kind == ConstructorInitializerKind::This);
                let mut statements = if chained {
                    Vec::new()
                } else {
                    self.initializer_blocks(declaration, &mut scope)?
                };
                statements.extend(self.linker.link(BodyOwner::plain(id), body, &mut scope)?.statements);
                MemberSyntax::Constructor {
                    accessibility,
                    modifiers,
                    name: self.type_name_of(declaration)?,
                    parameters: parameters.clone(),
                    initializer: initializer.clone(),
                    body: Block::new(statements),
                }
            }
            DeclarationData::Finalizer { body } => {
                let mut scope = InliningScope::new(&[], Some(body));
                MemberSyntax::Finalizer {
                    name: self.type_name_of(declaration)?,
                    body: self.linker.link(BodyOwner::plain(id), body, &mut scope)?,
                }
            }
            DeclarationData::Property { ty, is_auto, initializer, .. } => {
                let auto = *is_auto && emission == Emission::Plain;
                MemberSyntax::Property {
                    accessibility,
                    modifiers,
                    ty: ty.clone(),
                    name,
                    explicit_interface,
                    accessors: self.accessors(declaration, kind, auto)?,
                    initializer: if helper { None } else { initializer.clone() },
                }
            }
            DeclarationData::Event { ty, is_field_like, .. } => {
                let field_like = *is_field_like && emission == Emission::Plain;
                MemberSyntax::Event {
                    accessibility,
                    modifiers,
                    ty: ty.clone(),
                    name,
                    explicit_interface,
                    accessors: if field_like { None } else { Some(self.accessors(declaration, kind, false)?) },
                }
            }
        };
        Ok(member)
    }

    fn accessors(&mut self, owner: &Declaration, kind: SemanticKind, auto: bool) -> LinkerResult<Vec<AccessorSyntax>> {
        let analysis = self.analysis;
        let graph = &analysis.introduction.graph;
        let mut accessors = Vec::new();
        for accessor in owner.accessors() {
            let accessor_kind = match graph.get(accessor).method_role() {
                Some(MethodRole::PropertyGet) => AccessorKind::Get,
                Some(MethodRole::PropertySet) => AccessorKind::Set,
                Some(MethodRole::EventAdd) => AccessorKind::Add,
                Some(MethodRole::EventRemove) => AccessorKind::Remove,
                Some(MethodRole::Ordinary) | None => {
                    return Err(LinkerError::assertion_failed("accessors have an accessor role", graph.get(accessor).key.to_string()));
                }
            };
            let body = if auto { None } else { self.body_of(accessor, kind)? };
            accessors.push(AccessorSyntax { kind: accessor_kind, body });
        }
        Ok(accessors)
    }

    /// Linked body of a method or accessor semantic
    fn body_of(&mut self, symbol: DeclId, kind: SemanticKind) -> LinkerResult<Option<Block>> {
        let analysis = self.analysis;
        let declaration = analysis.introduction.graph.get(symbol);
        let mut scope = InliningScope::new(declaration.parameters(), declaration.body());
        if kind == SemanticKind::Final {
            return Ok(Some(self.linker.final_body(symbol, &mut scope)?));
        }
        match declaration.body() {
            Some(body) => Ok(Some(self.linker.link(BodyOwner::semantic(IntermediateSymbolSemantic::new(symbol, kind)), body, &mut scope)?)),
            None => Ok(None),
        }
    }

    /// Initializers run by a constructor, one flattenable block each in layer order
    fn initializer_blocks(&mut self, constructor: &Declaration, scope: &mut InliningScope) -> LinkerResult<Vec<Statement>> {
        let graph = &self.analysis.introduction.graph;
        let type_id = graph
            .declaring_type(constructor.id)
            .ok_or_else(|| LinkerError::assertion_failed("constructor has a declaring type", constructor.key.to_string()))?;
        self.initializers_of(type_id, initializer_kind(constructor.is_static), scope)
    }

    fn initializers_of(&mut self, type_id: DeclId, kind: InitializerKind, scope: &mut InliningScope) -> LinkerResult<Vec<Statement>> {
        let analysis = self.analysis;
        let mut statements = Vec::new();
        for addition in analysis.introduction.registry.initializers(type_id).iter().filter(|a| a.kind == kind) {
            let body = inliner::prepare_callee(addition.body.clone(), &[], scope);
            let mut linked = self.linker.link(BodyOwner::plain(type_id), &body, scope)?;
            linked.flattenable = true;
            statements.push(Statement::Block(linked));
        }
        Ok(statements)
    }

    /// Constructors running the initializers of a type that declares none of the needed kind
    fn synthesise_constructors(&mut self, type_id: DeclId, members: &mut Vec<MemberSyntax>) -> LinkerResult<()> {
        let analysis = self.analysis;
        let graph = &analysis.introduction.graph;
        for kind in [InitializerKind::Static, InitializerKind::Instance] {
            if !analysis.introduction.registry.initializers(type_id).iter().any(|a| a.kind == kind) {
                continue;
            }
            let declared = graph.children(type_id).iter().any(|&child| {
                let declaration = graph.get(child);
                declaration.kind() == DeclarationKind::Constructor && initializer_kind(declaration.is_static) == kind && !analysis.is_excluded(child)
            });
            if declared {
                continue;
            }

            let mut scope = InliningScope::default();
            let body = Block::new(self.initializers_of(type_id, kind, &mut scope)?);
            let constructor = MemberSyntax::Constructor {
                accessibility: if kind == InitializerKind::Static { Accessibility::Private } else { Accessibility::Public },
                modifiers: MemberModifiers {
                    is_static: kind == InitializerKind::Static,
                    is_override: false,
                },
                name: graph.get(type_id).name.clone(),
                parameters: Vec::new(),
                initializer: None,
                body,
            };
            let index = members.iter().rposition(|m| matches!(m, MemberSyntax::Field { .. })).map_or(0, |i| i + 1);
            debug!("Synthesised {:?} constructor for `{}`", kind, graph.get(type_id).key);
            members.insert(index, constructor);
        }
        Ok(())
    }

    fn type_name_of(&self, declaration: &Declaration) -> LinkerResult<String> {
        let graph = &self.analysis.introduction.graph;
        graph
            .declaring_type(declaration.id)
            .map(|type_id| graph.get(type_id).name.clone())
            .ok_or_else(|| LinkerError::assertion_failed("member has a declaring type", declaration.key.to_string()))
    }
}

/// First semantic of a member's chain: `Default` for introduced members, `Original` otherwise
fn chain_base_kind(analysis: &AnalysisRegistry, member: DeclId) -> SemanticKind {
    let introduction = &analysis.introduction;
    if introduction.registry.member_of(&introduction.graph, member).is_some() {
        SemanticKind::Default
    } else {
        SemanticKind::Original
    }
}

fn initializer_kind(is_static: bool) -> InitializerKind {
    if is_static { InitializerKind::Static } else { InitializerKind::Instance }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::tests::{analyze, introduce, override_method};
    use crate::config::LinkerConfig;
    use crate::injection::{MemberFlags, Transformation};
    use crate::ordering::AspectLayerId;
    use crate::symbols::{CompilationModel, MemberModel, Parameter, TypeModel};
    use crate::syntax::ast::{AssignmentOperator, BinaryOperator, Expr};

    fn model() -> CompilationModel {
        let body = Block::new(vec![Statement::ret(Some(Expr::binary(Expr::ident("x"), BinaryOperator::Multiply, Expr::int(2))))]);
        CompilationModel::new(vec![
            TypeModel::class("Service", "Service.cs")
                .with_member(MemberModel::field("count", "int"))
                .with_member(MemberModel::method("Run", "int", vec![Parameter::new("x", "int")], body).public()),
        ])
    }

    fn member_names(unit: &SyntaxUnit) -> Vec<&str> {
        unit.types[0].members.iter().map(MemberSyntax::name).collect()
    }

    #[test]
    fn test_unlinked_chain_keeps_helpers_after_target() {
        let layers = [AspectLayerId::new("A")];
        let introduction = introduce(&model(), &layers, &[override_method(&layers[0], "Service.Run(int)")]);
        let analysis = analyze(introduction, &LinkerConfig::debug());
        let units = UnitEmitter::new(&analysis).emit().unwrap();

        assert_eq!(units.len(), 1);
        assert_eq!(units[0].path, "Service.cs");
        assert_eq!(member_names(&units[0]), vec!["count", "Run", "Run_Source", "Run_A"]);
        match units[0].find_member("Service", "Run_A") {
            Some(MemberSyntax::Method { accessibility, .. }) => assert_eq!(*accessibility, Accessibility::Private),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_inlined_chain_leaves_only_target() {
        let layers = [AspectLayerId::new("A"), AspectLayerId::new("B")];
        let transformations = [override_method(&layers[0], "Service.Run(int)"), override_method(&layers[1], "Service.Run(int)")];
        let introduction = introduce(&model(), &layers, &transformations);
        let analysis = analyze(introduction, &LinkerConfig::default());
        let units = UnitEmitter::new(&analysis).emit().unwrap();
        assert_eq!(member_names(&units[0]), vec!["count", "Run"]);
    }

    #[test]
    fn test_initializer_synthesises_constructor() {
        let layers = [AspectLayerId::new("A")];
        let transformations = [Transformation::AddInitializer {
            layer: layers[0].clone(),
            target: "Service".to_string(),
            initializer: InitializerKind::Instance,
            body: Block::new(vec![Statement::expr(Expr::assign(Expr::this_member("count"), AssignmentOperator::Assign, Expr::int(1)))]),
        }];
        let introduction = introduce(&model(), &layers, &transformations);
        let analysis = analyze(introduction, &LinkerConfig::default());
        let units = UnitEmitter::new(&analysis).emit().unwrap();

        assert_eq!(member_names(&units[0]), vec!["count", "Service", "Run"]);
        match &units[0].types[0].members[1] {
            MemberSyntax::Constructor { accessibility, body, .. } => {
                assert_eq!(*accessibility, Accessibility::Public);
                assert!(matches!(&body.statements[0], Statement::Block(block) if block.flattenable));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_introduced_root_type_gets_own_unit() {
        let layers = [AspectLayerId::new("A")];
        let transformations = [Transformation::IntroduceType {
            layer: layers[0].clone(),
            container: None,
            declaration: TypeModel::class("Generated", "unused.cs").with_member(MemberModel::field("value", "int")),
        }];
        let introduction = introduce(&model(), &layers, &transformations);
        let analysis = analyze(introduction, &LinkerConfig::default());
        let units = UnitEmitter::new(&analysis).emit().unwrap();

        let paths: Vec<&str> = units.iter().map(|u| u.path.as_str()).collect();
        assert_eq!(paths, vec!["Service.cs", "Introduced.g.cs"]);
        assert_eq!(member_names(&units[1]), vec!["value"]);
    }

    #[test]
    fn test_unreachable_private_introduction_is_discarded() {
        let layers = [AspectLayerId::new("A")];
        let transformations = [Transformation::IntroduceMember {
            layer: layers[0].clone(),
            container: "Service".to_string(),
            member: MemberModel::method("Helper", "void", vec![], Block::empty()),
            flags: MemberFlags::NONE,
        }];
        let introduction = introduce(&model(), &layers, &transformations);
        let analysis = analyze(introduction, &LinkerConfig::default());
        let units = UnitEmitter::new(&analysis).emit().unwrap();
        assert_eq!(member_names(&units[0]), vec!["count", "Run"]);
    }
}
