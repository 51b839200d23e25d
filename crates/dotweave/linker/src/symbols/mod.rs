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

//! Symbol graph adapter
//!
//! Wraps the declaration graph produced by the compiler front end. A [`SymbolGraph`] is an
//! immutable snapshot: the introduction step extends it into a new snapshot rather than
//! mutating it, so every [`DeclId`] handed out stays valid for the whole pass.

pub mod declaration;
pub mod graph;
pub mod model;

pub use declaration::{
    Accessibility, ConstructorInitializer, ConstructorInitializerKind, DeclId, Declaration, DeclarationData, DeclarationKey, DeclarationKind,
    InterfaceImplementation, MethodRole, Parameter, TypeKind,
};
pub use graph::{AdaptStep, NewDeclaration, SymbolGraph, SymbolGraphBuilder, member_key, method_key};
pub use model::{AccessorModel, CompilationModel, EventAccessorsModel, MemberKindModel, MemberModel, TypeModel};
