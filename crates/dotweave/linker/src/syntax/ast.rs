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

//! Statement and expression trees for member bodies
//!
//! Bodies are plain owned trees. Nothing downstream relies on node identity: aspect references
//! carry an [`AspectReferenceId`] so they can be found again after a tree has been rebuilt.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable identifier of an aspect reference inside template code
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AspectReferenceId(pub u32);

impl fmt::Display for AspectReferenceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ref#{}", self.0)
    }
}

/// A brace-delimited statement list
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub statements: Vec<Statement>,
    /// Synthesised purely as a scope for inlined code; may be merged into its parent
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub flattenable: bool,
}

impl Block {
    pub fn new(statements: Vec<Statement>) -> Self {
        Self { statements, flattenable: false }
    }

    pub fn flattenable(statements: Vec<Statement>) -> Self {
        Self { statements, flattenable: true }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }
}

/// Statements of a member body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Statement {
    Block(Block),
    Expression {
        expression: Expr,
    },
    Local {
        name: String,
        /// `None` prints as `var`
        #[serde(default)]
        ty: Option<String>,
        #[serde(default)]
        initializer: Option<Expr>,
    },
    Return {
        #[serde(default)]
        value: Option<Expr>,
    },
    If {
        condition: Expr,
        then_branch: Box<Statement>,
        #[serde(default)]
        else_branch: Option<Box<Statement>>,
    },
    While {
        condition: Expr,
        body: Box<Statement>,
    },
    Try {
        body: Block,
        #[serde(default)]
        catches: Vec<CatchClause>,
        #[serde(default)]
        finally: Option<Block>,
    },
    Throw {
        #[serde(default)]
        value: Option<Expr>,
    },
    Labeled {
        label: String,
        statement: Box<Statement>,
    },
    Goto {
        label: String,
    },
    Empty,
}

impl Statement {
    pub fn expr(expression: Expr) -> Self {
        Statement::Expression { expression }
    }

    pub fn ret(value: Option<Expr>) -> Self {
        Statement::Return { value }
    }

    pub fn local(name: impl Into<String>, ty: Option<String>, initializer: Option<Expr>) -> Self {
        Statement::Local {
            name: name.into(),
            ty,
            initializer,
        }
    }

    pub fn goto(label: impl Into<String>) -> Self {
        Statement::Goto { label: label.into() }
    }

    pub fn labeled(label: impl Into<String>, statement: Statement) -> Self {
        Statement::Labeled {
            label: label.into(),
            statement: Box::new(statement),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Statement::Empty)
    }
}

/// A `catch` clause of a try statement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatchClause {
    #[serde(default)]
    pub exception_type: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    pub body: Block,
}

/// Literal values
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Literal {
    Null,
    Default,
    Bool(bool),
    Int(i64),
    String(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentOperator {
    Assign,
    AddAssign,
    SubtractAssign,
}

impl AssignmentOperator {
    pub fn token(self) -> &'static str {
        match self {
            AssignmentOperator::Assign => "=",
            AssignmentOperator::AddAssign => "+=",
            AssignmentOperator::SubtractAssign => "-=",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BinaryOperator {
    Add,
    Subtract,
    Multiply,
    Divide,
    Equals,
    NotEquals,
    LessThan,
    GreaterThan,
    And,
    Or,
    Coalesce,
}

impl BinaryOperator {
    pub fn token(self) -> &'static str {
        match self {
            BinaryOperator::Add => "+",
            BinaryOperator::Subtract => "-",
            BinaryOperator::Multiply => "*",
            BinaryOperator::Divide => "/",
            BinaryOperator::Equals => "==",
            BinaryOperator::NotEquals => "!=",
            BinaryOperator::LessThan => "<",
            BinaryOperator::GreaterThan => ">",
            BinaryOperator::And => "&&",
            BinaryOperator::Or => "||",
            BinaryOperator::Coalesce => "??",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnaryOperator {
    Not,
    Negate,
}

/// Expressions of a member body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Expr {
    Literal {
        value: Literal,
    },
    Identifier {
        name: String,
    },
    This,
    Base,
    TypeName {
        name: String,
    },
    MemberAccess {
        target: Box<Expr>,
        member: String,
    },
    Invocation {
        target: Box<Expr>,
        #[serde(default)]
        arguments: Vec<Expr>,
    },
    Assignment {
        target: Box<Expr>,
        operator: AssignmentOperator,
        value: Box<Expr>,
    },
    Binary {
        left: Box<Expr>,
        operator: BinaryOperator,
        right: Box<Expr>,
    },
    Unary {
        operator: UnaryOperator,
        operand: Box<Expr>,
    },
    AspectReference(AspectReference),
}

impl Expr {
    pub fn ident(name: impl Into<String>) -> Self {
        Expr::Identifier { name: name.into() }
    }

    pub fn literal(value: Literal) -> Self {
        Expr::Literal { value }
    }

    pub fn string(value: impl Into<String>) -> Self {
        Expr::Literal {
            value: Literal::String(value.into()),
        }
    }

    pub fn int(value: i64) -> Self {
        Expr::Literal { value: Literal::Int(value) }
    }

    pub fn type_name(name: impl Into<String>) -> Self {
        Expr::TypeName { name: name.into() }
    }

    pub fn member(target: Expr, member: impl Into<String>) -> Self {
        Expr::MemberAccess {
            target: Box::new(target),
            member: member.into(),
        }
    }

    pub fn call(target: Expr, arguments: Vec<Expr>) -> Self {
        Expr::Invocation {
            target: Box::new(target),
            arguments,
        }
    }

    pub fn assign(target: Expr, operator: AssignmentOperator, value: Expr) -> Self {
        Expr::Assignment {
            target: Box::new(target),
            operator,
            value: Box::new(value),
        }
    }

    pub fn binary(left: Expr, operator: BinaryOperator, right: Expr) -> Self {
        Expr::Binary {
            left: Box::new(left),
            operator,
            right: Box::new(right),
        }
    }

    /// `this.member`
    pub fn this_member(member: impl Into<String>) -> Self {
        Expr::member(Expr::This, member)
    }

    pub fn as_aspect_reference(&self) -> Option<&AspectReference> {
        match self {
            Expr::AspectReference(reference) => Some(reference),
            _ => None,
        }
    }
}

/// Which version of the referenced declaration the template asked for
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AspectReferenceOrder {
    /// The previous layer (`base`, `proceed`)
    Base,
    /// The fully composed declaration (`this`)
    Final,
}

/// How the referenced declaration is used
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReferenceAccess {
    Invoke {
        #[serde(default)]
        arguments: Vec<Expr>,
    },
    Get,
    Set {
        value: Box<Expr>,
    },
    Add {
        value: Box<Expr>,
    },
    Remove {
        value: Box<Expr>,
    },
}

/// A call from template code to `base`, `this` or `proceed`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AspectReference {
    /// Assigned when the template is registered
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<AspectReferenceId>,
    /// Structural key of the referenced declaration
    pub target: String,
    pub order: AspectReferenceOrder,
    pub receiver: Box<Expr>,
    pub access: ReferenceAccess,
}

impl AspectReference {
    pub fn new(target: impl Into<String>, order: AspectReferenceOrder, access: ReferenceAccess) -> Self {
        Self {
            id: None,
            target: target.into(),
            order,
            receiver: Box::new(Expr::This),
            access,
        }
    }

    /// `proceed(args...)` on a method
    pub fn proceed(target: impl Into<String>, arguments: Vec<Expr>) -> Self {
        Self::new(target, AspectReferenceOrder::Base, ReferenceAccess::Invoke { arguments })
    }

    pub fn with_receiver(mut self, receiver: Expr) -> Self {
        self.receiver = Box::new(receiver);
        self
    }

    pub fn into_expr(self) -> Expr {
        Expr::AspectReference(self)
    }
}
