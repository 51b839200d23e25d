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

//! Aspect reference resolution
//!
//! Maps every `base`/`this`/`proceed` reference of template code onto the intermediate semantic
//! it observes, given the layer whose body holds the reference.

use super::semantic::{IntermediateSymbolSemantic, SemanticKind};
use crate::diagnostics::{Diagnostic, DiagnosticCode};
use crate::error::{LinkerError, LinkerResult};
use crate::injection::IntroductionResult;
use crate::symbols::{DeclId, DeclarationData, DeclarationKind, MethodRole};
use crate::syntax::ast::{AspectReference, AspectReferenceId, AspectReferenceOrder, Expr, ReferenceAccess};

/// What a reference resolves to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolvedTarget {
    Semantic(IntermediateSymbolSemantic),
    /// The base-class member the holder overrides (`base.Member`)
    BaseMember,
    /// Nothing precedes the holder: the reference evaluates to `default` or does nothing
    Empty,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedReference {
    pub id: AspectReferenceId,
    /// Method, accessor, constructor or type whose code holds the reference
    pub holder: DeclId,
    /// Method or accessor the reference lands on
    pub declaration: DeclId,
    pub target: ResolvedTarget,
}

impl ResolvedReference {
    pub fn semantic(&self) -> Option<IntermediateSymbolSemantic> {
        match self.target {
            ResolvedTarget::Semantic(semantic) => Some(semantic),
            ResolvedTarget::BaseMember | ResolvedTarget::Empty => None,
        }
    }
}

/// Outcome of resolving one reference
#[derive(Debug, Clone, PartialEq)]
pub enum ReferenceResolution {
    Resolved(ResolvedReference),
    Invalid(Diagnostic),
}

/// Where a piece of code sits in the composition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReferenceContext {
    /// Member-level declaration holding the code, or the type for initializers
    pub holder: DeclId,
    pub type_id: DeclId,
    /// Layer that produced the code; `None` for source code
    pub layer_order: Option<usize>,
    /// Declaration overridden by the holder
    pub override_target: Option<DeclId>,
    /// Declaration removed from the output when the code holds an invalid reference
    pub excludes: Option<DeclId>,
}

pub struct AspectReferenceResolver<'a> {
    introduction: &'a IntroductionResult,
}

impl<'a> AspectReferenceResolver<'a> {
    pub fn new(introduction: &'a IntroductionResult) -> Self {
        Self { introduction }
    }

    /// Context of the body of a method, accessor, constructor or finalizer
    pub fn body_context(&self, declaration: DeclId) -> LinkerResult<ReferenceContext> {
        let graph = &self.introduction.graph;
        let registry = &self.introduction.registry;
        let member = graph.accessor_owner(declaration).unwrap_or(declaration);
        let type_id = graph
            .declaring_type(member)
            .ok_or_else(|| LinkerError::assertion_failed("code belongs to a type", graph.get(member).key.to_string()))?;

        let context = match registry.member_of(graph, member) {
            Some(introduced) if introduced.is_override() => ReferenceContext {
                holder: member,
                type_id,
                layer_order: registry.chain_layer_order(introduced),
                override_target: introduced.target,
                excludes: introduced.target,
            },
            Some(introduced) => ReferenceContext {
                holder: member,
                type_id,
                layer_order: self.introduction.order.order(&introduced.layer),
                override_target: None,
                excludes: Some(member),
            },
            None => ReferenceContext {
                holder: member,
                type_id,
                layer_order: None,
                override_target: None,
                excludes: Some(member),
            },
        };
        Ok(context)
    }

    /// Context of an initializer added to `type_id` by the layer at `layer_order`
    pub fn initializer_context(&self, type_id: DeclId, layer_order: usize) -> ReferenceContext {
        ReferenceContext {
            holder: type_id,
            type_id,
            layer_order: Some(layer_order),
            override_target: None,
            excludes: None,
        }
    }

    /// Kind of the first link of a member's chain: `Default` for new members, `Original` otherwise
    pub fn chain_base_kind(&self, member: DeclId) -> SemanticKind {
        let graph = &self.introduction.graph;
        match self.introduction.registry.member_of(graph, member) {
            Some(introduced) if !introduced.is_override() => SemanticKind::Default,
            _ => SemanticKind::Original,
        }
    }

    pub fn resolve(&self, context: &ReferenceContext, id: AspectReferenceId, reference: &AspectReference) -> LinkerResult<ReferenceResolution> {
        let graph = &self.introduction.graph;
        let registry = &self.introduction.registry;
        let invalid = |code: DiagnosticCode, message: String| -> LinkerResult<ReferenceResolution> {
            Ok(ReferenceResolution::Invalid(Diagnostic::error(code, message, Some(reference.target.clone()))))
        };

        let Some(target) = graph.lookup(&reference.target) else {
            return invalid(DiagnosticCode::InvalidReferenceTarget, format!("aspect reference to unknown declaration `{}`", reference.target));
        };
        let declaration = graph.get(target);
        let role = match (&declaration.data, &reference.access) {
            (DeclarationData::Method { role: MethodRole::Ordinary, .. }, ReferenceAccess::Invoke { .. }) => None,
            (DeclarationData::Property { .. }, ReferenceAccess::Get) => Some(MethodRole::PropertyGet),
            (DeclarationData::Property { .. }, ReferenceAccess::Set { .. }) => Some(MethodRole::PropertySet),
            (DeclarationData::Event { .. }, ReferenceAccess::Add { .. }) => Some(MethodRole::EventAdd),
            (DeclarationData::Event { .. }, ReferenceAccess::Remove { .. }) => Some(MethodRole::EventRemove),
            (data, _) => {
                let kind = data.kind();
                let message = match kind {
                    DeclarationKind::Method | DeclarationKind::Property | DeclarationKind::Event => {
                        format!("`{}` cannot be accessed this way from an aspect reference", reference.target)
                    }
                    _ => format!("{:?} `{}` cannot be the target of an aspect reference", kind, reference.target),
                };
                return invalid(DiagnosticCode::InvalidReferenceTarget, message);
            }
        };
        let accessor = match role {
            Some(role) => match graph.accessor(target, role) {
                Some(accessor) => accessor,
                None => {
                    return invalid(
                        DiagnosticCode::InvalidReferenceTarget,
                        format!("`{}` has no {} accessor", reference.target, role.accessor_keyword().unwrap_or_default()),
                    );
                }
            },
            None => target,
        };

        if registry.member_of(graph, target).is_some_and(|member| member.is_override()) {
            return invalid(DiagnosticCode::InvalidReferenceTarget, format!("`{}` is an override and cannot be referenced", reference.target));
        }
        let in_scope = context.override_target == Some(target) || graph.declaring_type(target) == Some(context.type_id);
        if !in_scope {
            return invalid(
                DiagnosticCode::InvalidReferenceTarget,
                format!("`{}` is neither the overridden member nor a member of `{}`", reference.target, graph.get(context.type_id).key),
            );
        }

        let receiver_is_valid = if declaration.is_static {
            matches!(reference.receiver.as_ref(), Expr::TypeName { name } if *name == graph.get(context.type_id).name)
        } else {
            matches!(reference.receiver.as_ref(), Expr::This)
        };
        if !receiver_is_valid {
            let expected = if declaration.is_static { "the declaring type" } else { "`this`" };
            return invalid(
                DiagnosticCode::InvalidReferenceReceiver,
                format!("the receiver of a reference to `{}` must be {}", reference.target, expected),
            );
        }

        let resolved = match reference.order {
            AspectReferenceOrder::Final if registry.is_override_target(target) => ResolvedTarget::Semantic(IntermediateSymbolSemantic::final_of(accessor)),
            AspectReferenceOrder::Final => ResolvedTarget::Semantic(IntermediateSymbolSemantic::new(accessor, self.chain_base_kind(target))),
            AspectReferenceOrder::Base if context.override_target.is_none() && context.holder == target => {
                if declaration.overridden_member.is_some() {
                    ResolvedTarget::BaseMember
                } else {
                    ResolvedTarget::Empty
                }
            }
            AspectReferenceOrder::Base => ResolvedTarget::Semantic(self.previous(target, role, accessor, context.layer_order)?),
        };

        Ok(ReferenceResolution::Resolved(ResolvedReference {
            id,
            holder: context.holder,
            declaration: accessor,
            target: resolved,
        }))
    }

    /// Last version of `target` produced before the layer at `layer_order`
    fn previous(&self, target: DeclId, role: Option<MethodRole>, accessor: DeclId, layer_order: Option<usize>) -> LinkerResult<IntermediateSymbolSemantic> {
        let graph = &self.introduction.graph;
        let registry = &self.introduction.registry;
        let Some(layer_order) = layer_order else {
            return Ok(IntermediateSymbolSemantic::new(accessor, self.chain_base_kind(target)));
        };

        let previous = registry
            .get_overrides(target)
            .into_iter()
            .rev()
            .find(|member| registry.chain_layer_order(member).is_some_and(|order| order < layer_order));
        match previous {
            Some(member) => {
                let symbol = match role {
                    Some(role) => graph.accessor(member.declaration, role).ok_or_else(|| {
                        LinkerError::assertion_failed("override has the accessors of its target", graph.get(member.declaration).key.to_string())
                    })?,
                    None => member.declaration,
                };
                Ok(IntermediateSymbolSemantic::default_of(symbol))
            }
            None => Ok(IntermediateSymbolSemantic::new(accessor, self.chain_base_kind(target))),
        }
    }
}
