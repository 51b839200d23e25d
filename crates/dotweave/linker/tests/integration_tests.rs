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

//! End-to-end linking runs through [`AspectLinker`]
//!
//! Each test builds a small compilation, a set of layers and their transformations, and checks
//! the emitted units and diagnostics.

use dotweave_linker::symbols::Parameter;
use dotweave_linker::syntax::ast::{AspectReference, AspectReferenceOrder, AssignmentOperator, BinaryOperator, Block, Expr, Literal, ReferenceAccess, Statement};
use dotweave_linker::syntax::{MemberSyntax, print_block};
use dotweave_linker::{
    AspectLayerId, AspectLinker, CancellationToken, CompilationModel, DiagnosticCode, InitializerKind, LayerSelector, LinkerConfig, LinkerInput,
    LinkerOutput, MemberFlags, MemberModel, MemberTemplate, OrderingConstraint, Severity, Transformation, TypeModel,
};

const RUN: &str = "Service.Run(int)";

fn service() -> CompilationModel {
    let run = Block::new(vec![Statement::ret(Some(Expr::binary(Expr::ident("x"), BinaryOperator::Multiply, Expr::int(2))))]);
    let stop = Block::new(vec![Statement::expr(Expr::call(Expr::ident("Release"), vec![]))]);
    CompilationModel::new(vec![
        TypeModel::class("Service", "Service.cs")
            .with_member(MemberModel::method("Run", "int", vec![Parameter::new("x", "int")], run).public())
            .with_member(MemberModel::method("Stop", "void", vec![], stop).public()),
    ])
}

/// `Log("<layer>"); return proceed(x);`
fn logging_override(layer: &AspectLayerId) -> Transformation {
    let body = Block::new(vec![
        Statement::expr(Expr::call(Expr::ident("Log"), vec![Expr::string(layer.to_string())])),
        Statement::ret(Some(AspectReference::proceed(RUN, vec![Expr::ident("x")]).into_expr())),
    ]);
    Transformation::OverrideMember {
        layer: layer.clone(),
        target: RUN.to_string(),
        template: MemberTemplate::Method { body },
        flags: MemberFlags::NONE,
    }
}

fn input(layers: Vec<AspectLayerId>, ordering: Vec<OrderingConstraint>, transformations: Vec<Transformation>) -> LinkerInput {
    LinkerInput {
        compilation: service(),
        layers,
        ordering,
        transformations,
    }
}

fn link(input: &LinkerInput, config: LinkerConfig) -> LinkerOutput {
    AspectLinker::new(config)
        .expect("valid config")
        .link(input, &CancellationToken::new())
        .expect("linking should succeed")
}

fn method_body<'a>(output: &'a LinkerOutput, name: &str) -> &'a Block {
    match output.unit("Service.cs").and_then(|unit| unit.find_member("Service", name)) {
        Some(MemberSyntax::Method { body: Some(body), .. }) => body,
        other => panic!("no method `{}`: {:?}", name, other),
    }
}

fn member_names(output: &LinkerOutput) -> Vec<String> {
    let unit = output.unit("Service.cs").expect("service unit");
    unit.types[0].members.iter().map(|m| m.name().to_string()).collect()
}

#[test]
fn test_no_overrides_keeps_original() {
    let output = link(&input(vec![AspectLayerId::new("Logging")], vec![], vec![]), LinkerConfig::default());

    assert!(output.diagnostics.is_empty());
    assert_eq!(member_names(&output), vec!["Run", "Stop"]);
    assert_eq!(print_block(method_body(&output, "Run")), "{\n    return x * 2;\n}\n");
}

#[test]
fn test_chain_runs_later_layers_first() {
    let layers = vec![AspectLayerId::new("L1"), AspectLayerId::new("L2")];
    let ordering = vec![OrderingConstraint::new(LayerSelector::aspect("L1"), LayerSelector::aspect("L2"))];
    let transformations = vec![logging_override(&layers[0]), logging_override(&layers[1])];
    let input = input(layers, ordering, transformations);

    // inlined: the whole chain lands in the final body
    let output = link(&input, LinkerConfig::default());
    assert!(output.diagnostics.is_empty(), "{:?}", output.diagnostics);
    assert_eq!(member_names(&output), vec!["Run", "Stop"]);
    let text = print_block(method_body(&output, "Run"));
    let l2 = text.find("Log(\"L2\")").expect("L2 body");
    let l1 = text.find("Log(\"L1\")").expect("L1 body");
    let original = text.find("x * 2").expect("original body");
    assert!(l2 < l1 && l1 < original, "{}", text);

    // not inlined: one member per link, each calling the previous one
    let output = link(&input, LinkerConfig::debug());
    assert_eq!(member_names(&output), vec!["Run", "Run_Source", "Run_L1", "Run_L2", "Stop"]);
    assert_eq!(print_block(method_body(&output, "Run")), "{\n    return this.Run_L2(x);\n}\n");
    assert!(print_block(method_body(&output, "Run_L2")).contains("return this.Run_L1(x);"));
    assert!(print_block(method_body(&output, "Run_L1")).contains("return this.Run_Source(x);"));
    assert_eq!(print_block(method_body(&output, "Run_Source")), "{\n    return x * 2;\n}\n");
}

#[test]
fn test_layer_without_proceed_prunes_earlier_links() {
    let layers = vec![AspectLayerId::new("A"), AspectLayerId::new("B")];
    let ordering = vec![OrderingConstraint::new(LayerSelector::aspect("A"), LayerSelector::aspect("B"))];
    let replacement = Transformation::OverrideMember {
        layer: layers[1].clone(),
        target: RUN.to_string(),
        template: MemberTemplate::Method {
            body: Block::new(vec![Statement::ret(Some(Expr::int(0)))]),
        },
        flags: MemberFlags::NONE,
    };
    let input = input(layers.clone(), ordering, vec![logging_override(&layers[0]), replacement]);

    let output = link(&input, LinkerConfig::debug());
    assert!(output.diagnostics.is_empty(), "{:?}", output.diagnostics);
    assert_eq!(member_names(&output), vec!["Run", "Run_B", "Stop"]);
    assert_eq!(print_block(method_body(&output, "Run")), "{\n    return this.Run_B(x);\n}\n");
    let text = output.unit("Service.cs").unwrap().to_source();
    assert!(!text.contains("Run_A") && !text.contains("Run_Source"), "{}", text);
}

#[test]
fn test_inlined_void_replacement_has_no_trailing_return() {
    let layer = AspectLayerId::new("Audit");
    let replacement = Transformation::OverrideMember {
        layer: layer.clone(),
        target: "Service.Stop()".to_string(),
        template: MemberTemplate::Method {
            body: Block::new(vec![Statement::expr(Expr::call(Expr::ident("Log"), vec![]))]),
        },
        flags: MemberFlags::NONE,
    };
    let output = link(&input(vec![layer], vec![], vec![replacement]), LinkerConfig::default());

    assert_eq!(member_names(&output), vec!["Run", "Stop"]);
    assert_eq!(print_block(method_body(&output, "Stop")), "{\n    Log();\n}\n");
}

#[test]
fn test_unordered_layers_warn_and_stay_stable() {
    let layers = vec![AspectLayerId::new("Caching"), AspectLayerId::new("Logging")];
    let transformations = vec![logging_override(&layers[0]), logging_override(&layers[1])];
    let input = input(layers, vec![], transformations);

    let first = link(&input, LinkerConfig::debug());
    let second = link(&input, LinkerConfig::debug());

    assert_eq!(first.diagnostics.len(), 1);
    assert_eq!(first.diagnostics[0].code, DiagnosticCode::UnorderedLayers);
    assert_eq!(first.diagnostics[0].severity, Severity::Warning);
    assert_eq!(first.diagnostics, second.diagnostics);
    assert_eq!(first.sources(), second.sources());

    // registration order decides: Logging was registered last, so it runs first
    assert_eq!(print_block(method_body(&first, "Run")), "{\n    return this.Run_Logging(x);\n}\n");
}

#[test]
fn test_strict_ordering_excludes_ambiguous_target() {
    let layers = vec![AspectLayerId::new("Caching"), AspectLayerId::new("Logging")];
    let transformations = vec![logging_override(&layers[0]), logging_override(&layers[1])];
    let output = link(&input(layers, vec![], transformations), LinkerConfig::strict());

    assert!(output.has_errors());
    assert_eq!(member_names(&output), vec!["Stop"]);
}

#[test]
fn test_foreign_receiver_excludes_only_its_target() {
    let layers = vec![AspectLayerId::new("Remote")];
    let foreign = Block::new(vec![Statement::ret(Some(
        AspectReference::proceed(RUN, vec![Expr::ident("x")]).with_receiver(Expr::ident("other")).into_expr(),
    ))]);
    let audit = Block::new(vec![
        Statement::expr(Expr::call(Expr::ident("Audit"), vec![])),
        Statement::expr(AspectReference::proceed("Service.Stop()", vec![]).into_expr()),
    ]);
    let transformations = vec![
        Transformation::OverrideMember {
            layer: layers[0].clone(),
            target: RUN.to_string(),
            template: MemberTemplate::Method { body: foreign },
            flags: MemberFlags::NONE,
        },
        Transformation::OverrideMember {
            layer: layers[0].clone(),
            target: "Service.Stop()".to_string(),
            template: MemberTemplate::Method { body: audit },
            flags: MemberFlags::NONE,
        },
    ];
    let output = link(&input(layers, vec![], transformations), LinkerConfig::default());

    let errors: Vec<_> = output.diagnostics.iter().filter(|d| d.is_error()).collect();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].code, DiagnosticCode::InvalidReferenceReceiver);
    assert_eq!(member_names(&output), vec!["Stop"]);

    let text = print_block(method_body(&output, "Stop"));
    assert!(text.contains("Audit();"));
    assert!(text.contains("Release();"));
}

#[test]
fn test_unknown_target_aborts() {
    let layers = vec![AspectLayerId::new("Logging")];
    let mut transformation = logging_override(&layers[0]);
    if let Transformation::OverrideMember { target, .. } = &mut transformation {
        *target = "Service.Missing()".to_string();
    }
    let result = AspectLinker::new(LinkerConfig::default())
        .unwrap()
        .link(&input(layers, vec![], vec![transformation]), &CancellationToken::new());

    match result {
        Err(error) => {
            assert!(error.is_recoverable());
            assert!(error.diagnostics().iter().any(|d| d.code == DiagnosticCode::UnknownTarget));
        }
        Ok(output) => panic!("expected abort, got {:?}", output.diagnostics),
    }
}

#[test]
fn test_ordering_cycle_aborts() {
    let layers = vec![AspectLayerId::new("A"), AspectLayerId::new("B")];
    let ordering = vec![
        OrderingConstraint::new(LayerSelector::aspect("A"), LayerSelector::aspect("B")),
        OrderingConstraint::new(LayerSelector::aspect("B"), LayerSelector::aspect("A")),
    ];
    let result = AspectLinker::new(LinkerConfig::default())
        .unwrap()
        .link(&input(layers, ordering, vec![]), &CancellationToken::new());
    assert!(matches!(result, Err(dotweave_linker::LinkerError::OrderingCycle { .. })));
}

#[test]
fn test_introduced_members_and_interfaces() {
    let layer = AspectLayerId::new("Disposal");
    let dispose = Block::new(vec![Statement::expr(AspectReference::proceed("Service.Stop()", vec![]).into_expr())]);
    let transformations = vec![
        Transformation::IntroduceInterface {
            layer: layer.clone(),
            target: "Service".to_string(),
            interface: "IDisposable".to_string(),
        },
        Transformation::IntroduceMember {
            layer: layer.clone(),
            container: "Service".to_string(),
            member: MemberModel::method("Dispose", "void", vec![], dispose).public(),
            flags: MemberFlags::NONE,
        },
    ];
    let output = link(&input(vec![layer], vec![], transformations), LinkerConfig::default());

    let unit = output.unit("Service.cs").unwrap();
    assert_eq!(unit.types[0].base_list, vec!["IDisposable".to_string()]);
    assert_eq!(member_names(&output), vec!["Run", "Stop", "Dispose"]);
    assert!(unit.to_source().contains("public class Service : IDisposable"));
}

#[test]
fn test_introduced_types_with_same_name_in_two_namespaces() {
    let layer = AspectLayerId::new("Generator");
    let generated = |namespace: &str| Transformation::IntroduceType {
        layer: layer.clone(),
        container: None,
        declaration: TypeModel::class("Generated", "unused.cs").in_namespace(namespace),
    };
    let output = link(&input(vec![layer.clone()], vec![], vec![generated("Beta"), generated("Alpha")]), LinkerConfig::default());

    let unit = output.unit("Introduced.g.cs").expect("introduced unit");
    let namespaces: Vec<Option<&str>> = unit.types.iter().map(|t| t.namespace.as_deref()).collect();
    assert_eq!(namespaces, vec![Some("Alpha"), Some("Beta")]);
}

#[test]
fn test_initializers_run_in_existing_constructor() {
    let layers = vec![AspectLayerId::new("First"), AspectLayerId::new("Second")];
    let ordering = vec![OrderingConstraint::new(LayerSelector::aspect("First"), LayerSelector::aspect("Second"))];
    let ctor = Block::new(vec![Statement::expr(Expr::call(Expr::ident("Init"), vec![]))]);
    let mut compilation = service();
    compilation.types[0].members.push(MemberModel::constructor(vec![], ctor).public());

    let initializer = |layer: &AspectLayerId, value: i64| Transformation::AddInitializer {
        layer: layer.clone(),
        target: "Service".to_string(),
        initializer: InitializerKind::Instance,
        body: Block::new(vec![Statement::expr(Expr::assign(Expr::this_member("state"), AssignmentOperator::Assign, Expr::int(value)))]),
    };
    let input = LinkerInput {
        compilation,
        transformations: vec![initializer(&layers[1], 2), initializer(&layers[0], 1)],
        layers,
        ordering,
    };
    let output = link(&input, LinkerConfig::default());

    match output.unit("Service.cs").and_then(|unit| unit.find_member("Service", "Service")) {
        Some(MemberSyntax::Constructor { body, .. }) => {
            assert_eq!(print_block(body), "{\n    this.state = 1;\n    this.state = 2;\n    Init();\n}\n");
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_auto_property_override_gets_backing_field() {
    let layer = AspectLayerId::new("Validation");
    let mut compilation = service();
    compilation.types[0].members.push(MemberModel::auto_property("Name", "string").public());

    let setter = Block::new(vec![
        Statement::If {
            condition: Expr::binary(Expr::ident("value"), BinaryOperator::Equals, Expr::literal(Literal::Null)),
            then_branch: Box::new(Statement::Throw {
                value: Some(Expr::ident("error")),
            }),
            else_branch: None,
        },
        Statement::expr(
            AspectReference::new(
                "Service.Name",
                AspectReferenceOrder::Base,
                ReferenceAccess::Set {
                    value: Box::new(Expr::ident("value")),
                },
            )
            .into_expr(),
        ),
    ]);
    let input = LinkerInput {
        compilation,
        layers: vec![layer.clone()],
        ordering: vec![],
        transformations: vec![Transformation::OverrideMember {
            layer,
            target: "Service.Name".to_string(),
            template: MemberTemplate::Property {
                getter: None,
                setter: Some(setter),
            },
            flags: MemberFlags::NONE,
        }],
    };
    let output = link(&input, LinkerConfig::default());

    let unit = output.unit("Service.cs").unwrap();
    assert!(matches!(unit.find_member("Service", "_name"), Some(MemberSyntax::Field { .. })));
    let text = unit.to_source();
    assert!(text.contains("throw error;"), "{}", text);
    assert!(text.contains("this._name = value;"), "{}", text);
    assert!(!text.contains("Name_Validation"), "{}", text);
}

#[test]
fn test_output_serialises_to_json() {
    let output = link(&input(vec![AspectLayerId::new("Logging")], vec![], vec![]), LinkerConfig::default());
    let json = serde_json::to_value(&output).unwrap();
    assert_eq!(json["units"][0]["path"], "Service.cs");
    assert!(json["metrics"]["stage_times"].get("linking").is_some());
}
