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

//! Runs the `link` and `order` commands against input files on disk

use dotweave_linker::symbols::Parameter;
use dotweave_linker::syntax::ast::{AspectReference, Block, Expr, Statement};
use dotweave_linker::{AspectLayerId, CompilationModel, LinkerInput, MemberFlags, MemberModel, MemberTemplate, Transformation, TypeModel};
use dotweave_tools::cli::link::{LinkArgs, handle_link};
use dotweave_tools::cli::order::handle_order;
use std::path::{Path, PathBuf};
use tempfile::tempdir;

fn write_input(dir: &Path, receiver: Expr) -> PathBuf {
    let layer = AspectLayerId::new("Logging");
    let body = Block::new(vec![Statement::ret(Some(Expr::ident("x")))]);
    let template = Block::new(vec![
        Statement::expr(Expr::call(Expr::ident("Log"), vec![])),
        Statement::ret(Some(AspectReference::proceed("Service.Run(int)", vec![Expr::ident("x")]).with_receiver(receiver).into_expr())),
    ]);
    let input = LinkerInput {
        compilation: CompilationModel::new(vec![
            TypeModel::class("Service", "src/Service.cs").with_member(MemberModel::method("Run", "int", vec![Parameter::new("x", "int")], body).public()),
        ]),
        layers: vec![layer.clone()],
        ordering: vec![],
        transformations: vec![Transformation::OverrideMember {
            layer,
            target: "Service.Run(int)".to_string(),
            template: MemberTemplate::Method { body: template },
            flags: MemberFlags::NONE,
        }],
    };
    let path = dir.join("input.json");
    std::fs::write(&path, serde_json::to_string_pretty(&input).unwrap()).unwrap();
    path
}

fn args(input: PathBuf, output_dir: Option<PathBuf>) -> LinkArgs {
    LinkArgs {
        input,
        output_dir,
        json: false,
        no_inline: false,
        strict: false,
        no_cleanup: false,
        max_depth: None,
        report: false,
        timeout: None,
    }
}

#[test]
fn test_link_writes_units_to_output_dir() {
    let dir = tempdir().unwrap();
    let input = write_input(dir.path(), Expr::This);
    let out = dir.path().join("out");

    assert!(handle_link(&args(input, Some(out.clone()))).unwrap());

    let source = std::fs::read_to_string(out.join("src/Service.cs")).unwrap();
    assert!(source.contains("public int Run(int x)"), "{}", source);
    assert!(source.contains("Log();"), "{}", source);
    assert!(!source.contains("Run_Logging"), "{}", source);
}

#[test]
fn test_link_reports_errors_without_failing() {
    let dir = tempdir().unwrap();
    let input = write_input(dir.path(), Expr::ident("other"));
    let out = dir.path().join("out");

    assert!(!handle_link(&args(input, Some(out.clone()))).unwrap());
    let source = std::fs::read_to_string(out.join("src/Service.cs")).unwrap();
    assert!(!source.contains("Run"), "{}", source);
}

#[test]
fn test_malformed_input_is_an_error() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("input.json");
    std::fs::write(&input, "{ \"layers\": 3 }").unwrap();

    let error = handle_link(&args(input, None)).unwrap_err();
    assert!(format!("{:#}", error).contains("not a valid linker input"));
}

#[test]
fn test_order_command_succeeds() {
    let dir = tempdir().unwrap();
    let input = write_input(dir.path(), Expr::This);
    assert!(handle_order(&input).unwrap());
}
