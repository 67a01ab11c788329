//! Tests for the `Fga` attack API.

mod common;

use common::{FailingOracle, FixedGradient, Ring, ring};
use gradflip_core::{
    AttackError, AttackErrorKind, CsrMatrix, DenseMatrix, Device, FgaBuilder, FlipKind,
    FlipPolicy, LinearGcn, OracleError, validate_adjacency,
};
use gradflip_test_support::tracing::RecordingLayer;
use rand::{Rng, SeedableRng, rngs::SmallRng};
use rstest::{fixture, rstest};
use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;

#[fixture]
fn inputs() -> Ring {
    ring()
}

#[rstest]
fn builder_defaults() {
    let builder = FgaBuilder::new(FixedGradient::new(vec![0.0; 4]), 4);
    assert_eq!(builder.node_count(), 4);
    assert_eq!(builder.flip_policy(), FlipPolicy::Accumulate);

    let fga = builder.build().expect("defaults valid");
    assert_eq!(fga.node_count().get(), 4);
    assert_eq!(fga.feature_shape(), None);
    assert!(fga.modified_adjacency().is_none());
}

#[rstest]
#[case::features_only(false, true, AttackError::FeatureAttackUnsupported)]
#[case::both(true, true, AttackError::FeatureAttackUnsupported)]
#[case::neither(false, false, AttackError::NothingToAttack)]
fn builder_rejects_unsupported_targets(
    #[case] structure: bool,
    #[case] features: bool,
    #[case] expected: AttackError,
) {
    let err = FgaBuilder::new(FixedGradient::new(vec![0.0; 4]), 4)
        .with_attack_structure(structure)
        .with_attack_features(features)
        .build()
        .expect_err("configuration is unsupported");
    assert_eq!(err, expected);
    assert_eq!(err.kind(), AttackErrorKind::Configuration);
}

#[rstest]
fn builder_rejects_zero_nodes() {
    let err = FgaBuilder::new(FixedGradient::new(Vec::new()), 0)
        .build()
        .expect_err("empty graphs cannot be attacked");
    assert_eq!(err, AttackError::ZeroNodes);
}

#[rstest]
fn builder_rejects_cuda() {
    let err = FgaBuilder::new(FixedGradient::new(vec![0.0; 4]), 4)
        .with_device(Device::Cuda)
        .build()
        .expect_err("no CUDA backend is compiled in");
    assert!(matches!(
        err,
        AttackError::BackendUnavailable { requested } if requested == Device::Cuda
    ));
}

#[rstest]
fn builder_rejects_inconsistent_feature_shape() {
    let err = FgaBuilder::new(FixedGradient::new(vec![0.0; 4]), 4)
        .with_feature_shape((5, 2))
        .build()
        .expect_err("feature rows must match node count");
    assert_eq!(
        err,
        AttackError::NodeCountMismatch {
            input: "feature shape",
            expected: 4,
            actual: 5,
        }
    );
}

#[rstest]
fn attack_removes_lowest_cost_edge(inputs: Ring) {
    let mut fga = FgaBuilder::new(FixedGradient::new(vec![0.0, 5.0, -3.0, 1.0]), 4)
        .build()
        .expect("configuration must be valid");
    let report = fga
        .attack(&inputs.features, &inputs.adjacency, &inputs.labels, &inputs.train, 0, 1)
        .expect("attack must succeed");

    assert_eq!(report.target(), 0);
    assert_eq!(report.net_flips(), vec![(3, FlipKind::Removed)]);
    let modified = fga.modified_adjacency().expect("result stored");
    let expected = CsrMatrix::from_undirected_edges(4, &[(0, 1), (1, 2), (2, 3)])
        .expect("edges are in bounds");
    assert_eq!(modified, &expected);
}

#[rstest]
fn attack_propagates_oracle_failure(inputs: Ring) {
    let mut fga = FgaBuilder::new(FailingOracle, 4)
        .build()
        .expect("configuration must be valid");
    let err = fga
        .attack(&inputs.features, &inputs.adjacency, &inputs.labels, &inputs.train, 1, 2)
        .expect_err("oracle always fails");
    assert!(matches!(
        &err,
        AttackError::Oracle { oracle, error: OracleError::Evaluation { .. } }
            if &**oracle == "failing"
    ));
    assert!(fga.modified_adjacency().is_none());
}

#[rstest]
fn attack_rejects_wrong_gradient_length(inputs: Ring) {
    let mut fga = FgaBuilder::new(FixedGradient::new(vec![0.0; 3]), 4)
        .build()
        .expect("configuration must be valid");
    let err = fga
        .attack(&inputs.features, &inputs.adjacency, &inputs.labels, &inputs.train, 0, 1)
        .expect_err("gradient is short");
    assert_eq!(
        err,
        AttackError::GradientLength {
            expected: 4,
            actual: 3,
        }
    );
}

#[rstest]
fn attack_rejects_mismatched_adjacency(inputs: Ring) {
    let mut fga = FgaBuilder::new(FixedGradient::new(vec![0.0; 4]), 4)
        .build()
        .expect("configuration must be valid");
    let small = CsrMatrix::from_undirected_edges(3, &[(0, 1)]).expect("edges are in bounds");
    let err = fga
        .attack(&inputs.features, &small, &inputs.labels, &inputs.train, 0, 1)
        .expect_err("adjacency covers three nodes");
    assert_eq!(
        err,
        AttackError::NodeCountMismatch {
            input: "adjacency",
            expected: 4,
            actual: 3,
        }
    );
}

#[rstest]
fn attack_records_tracing(inputs: Ring) {
    let mut fga = FgaBuilder::new(FixedGradient::new(vec![0.0, 5.0, 2.0, 5.0]), 4)
        .build()
        .expect("configuration must be valid");
    let layer = RecordingLayer::default();
    let subscriber = tracing_subscriber::registry().with(layer.clone());

    let report = tracing::subscriber::with_default(subscriber, || {
        fga.attack(&inputs.features, &inputs.adjacency, &inputs.labels, &inputs.train, 0, 2)
    })
    .expect("attack must succeed");
    assert_eq!(report.reverted_count(), 1);

    let span = layer.span("attack.run").expect("attack.run span must exist");
    assert_eq!(span.field("oracle"), Some("fixed"));
    assert_eq!(span.field("nodes"), Some("4"));
    assert_eq!(span.field("target"), Some("0"));
    assert_eq!(span.field("n_perturbations"), Some("2"));
    assert_eq!(span.field("policy"), Some("accumulate"));

    let flips = layer.events_with_message(Level::DEBUG, "applied edge flip");
    assert_eq!(flips.len(), 2);
    assert_eq!(flips[0].field("column"), Some("2"));
    assert_eq!(flips[0].field("kind"), Some("added"));
    assert_eq!(flips[1].field("kind"), Some("removed"));
    assert!(flips.iter().all(|event| event.span.as_deref() == Some("attack.run")));

    assert!(layer.has_event(
        Level::WARN,
        "column re-selected; flip reverts an earlier perturbation"
    ));
    let completed = layer.events_with_message(Level::INFO, "attack completed");
    assert_eq!(completed.len(), 1);
    assert_eq!(completed[0].field("reverted"), Some("1"));
}

#[rstest]
fn attack_logs_empty_training_warning(inputs: Ring) {
    let mut fga = FgaBuilder::new(FixedGradient::new(vec![0.0; 4]), 4)
        .build()
        .expect("configuration must be valid");
    let layer = RecordingLayer::default();
    let subscriber = tracing_subscriber::registry().with(layer.clone());

    let err = tracing::subscriber::with_default(subscriber, || {
        fga.attack(&inputs.features, &inputs.adjacency, &inputs.labels, &[], 0, 1)
    })
    .expect_err("empty training sets must fail");
    assert_eq!(err, AttackError::EmptyTrainingSet);
    assert!(layer.has_event(Level::WARN, "training index set is empty, returning error"));
    assert!(layer.events_with_message(Level::INFO, "starting structure attack").is_empty());
}

fn random_graph(rng: &mut SmallRng, nodes: usize, probability: f64) -> CsrMatrix {
    let mut edges = Vec::new();
    for u in 0..nodes {
        for v in (u + 1)..nodes {
            if rng.gen_bool(probability) {
                edges.push((u, v));
            }
        }
    }
    CsrMatrix::from_undirected_edges(nodes, &edges).expect("edges are in bounds")
}

fn random_matrix(rng: &mut SmallRng, rows: usize, cols: usize) -> DenseMatrix {
    let data = (0..rows * cols).map(|_| rng.gen_range(-1.0..1.0)).collect();
    DenseMatrix::from_vec(rows, cols, data).expect("shape matches data")
}

#[rstest]
#[case::accumulate(FlipPolicy::Accumulate)]
#[case::clamp(FlipPolicy::Clamp)]
#[case::skip_flipped(FlipPolicy::SkipFlipped)]
fn surrogate_attack_is_deterministic_and_valid(#[case] policy: FlipPolicy) {
    let mut rng = SmallRng::seed_from_u64(7);
    let nodes = 12;
    let adjacency = random_graph(&mut rng, nodes, 0.3);
    let features = random_matrix(&mut rng, nodes, 5);
    let model = LinearGcn::new(random_matrix(&mut rng, 5, 3)).expect("finite weights");
    let labels: Vec<usize> = (0..nodes).map(|_| rng.gen_range(0..3)).collect();
    let train: Vec<usize> = (0..nodes).step_by(2).collect();

    let run = || {
        let mut fga = FgaBuilder::new(model.clone(), nodes)
            .with_feature_shape((nodes, 5))
            .with_flip_policy(policy)
            .build()
            .expect("configuration must be valid");
        let report = fga
            .attack(&features, &adjacency, &labels, &train, 3, 4)
            .expect("attack must succeed");
        let modified = fga.modified_adjacency().cloned().expect("result stored");
        (report, modified)
    };

    let (first_report, first) = run();
    let (second_report, second) = run();
    assert_eq!(first_report, second_report);
    assert_eq!(first, second);

    assert_eq!(first_report.flips().len(), 4);
    assert!(validate_adjacency(&first).is_ok());
    assert_eq!(first.get(3, 3), 0.0);
    assert!(first.diff_count(&adjacency) <= 8);
    assert!(first_report.flips().iter().all(|flip| flip.column != 3));
}

#[rstest]
fn instance_is_reusable_across_targets(inputs: Ring) {
    let model = LinearGcn::new(DenseMatrix::from_rows(&[
        vec![1.0, -1.0],
        vec![-1.0, 1.0],
        vec![0.5, 0.5],
        vec![0.0, 1.0],
    ])
    .expect("rows"))
    .expect("finite weights");
    let mut fga = FgaBuilder::new(model, 4)
        .build()
        .expect("configuration must be valid");

    for target in 0..4 {
        let report = fga
            .attack(&inputs.features, &inputs.adjacency, &inputs.labels, &inputs.train, target, 1)
            .expect("attack must succeed");
        assert_eq!(report.target(), target);
        let modified = fga.modified_adjacency().expect("result stored");
        assert_eq!(modified.diff_count(&inputs.adjacency), 2);
        let flip = report.flips()[0];
        assert_ne!(modified.get(target, flip.column), inputs.adjacency.get(target, flip.column));
    }
}
