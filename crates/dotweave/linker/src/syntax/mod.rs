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

//! Syntax model
//!
//! Member bodies travel through the linker as owned statement trees ([`ast`]). The linking step
//! assembles them into [`SyntaxUnit`]s, which [`printer`] renders as source text.

pub mod ast;
pub mod member;
pub mod printer;
pub mod walk;

pub use ast::{
    AspectReference, AspectReferenceId, AspectReferenceOrder, AssignmentOperator, BinaryOperator, Block, CatchClause, Expr, Literal, ReferenceAccess,
    Statement, UnaryOperator,
};
pub use member::{AccessorKind, AccessorSyntax, MemberModifiers, MemberSyntax, SyntaxUnit, TypeSyntax};
pub use printer::{print_block, print_expr, print_unit};
