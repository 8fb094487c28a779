use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use groundtruth::dataset::{Matrix, SENTINEL};
use groundtruth::error::Result;
use groundtruth::metric::{DistanceMetric, EngineConvention, MetricSpace};
use groundtruth::radial::{self, RadialThresholdGenerator};

fn sample_train() -> Result<Matrix<f32>> {
    Matrix::from_rows(vec![
        vec![0.0, 0.0],
        vec![1.0, 0.0],
        vec![0.0, 1.0],
        vec![5.0, 5.0],
    ])
}

fn origin_query() -> Result<Matrix<f32>> {
    Matrix::from_rows(vec![vec![0.0, 0.0]])
}

fn l2() -> Result<MetricSpace> {
    MetricSpace::new(DistanceMetric::L2Squared, None)
}

fn random_matrix(rng: &mut StdRng, rows: usize, cols: usize) -> Result<Matrix<f32>> {
    let data = (0..rows * cols)
        .map(|_| rng.random_range(-1.0f32..1.0))
        .collect();
    Matrix::new(rows, cols, data)
}

#[test]
fn radial_keeps_every_neighbor_on_the_boundary() -> Result<()> {
    let (neighbors, stats) = radial::generate(&sample_train()?, &origin_query()?, l2()?, 1.0, 10)?;

    assert_eq!(neighbors.neighbors(0), &[0, 1, 2]);
    assert_eq!(neighbors.row(0)[3..], [SENTINEL; 7]);
    assert_eq!(stats.count, 1);
    assert_eq!(stats.max, 3);
    assert_eq!(stats.num_zero_neighbors, 0);
    Ok(())
}

#[test]
fn radial_tighter_threshold_keeps_only_exact_match() -> Result<()> {
    let (neighbors, _) = radial::generate(&sample_train()?, &origin_query()?, l2()?, 0.5, 10)?;
    assert_eq!(neighbors.neighbors(0), &[0]);
    Ok(())
}

#[test]
fn radial_truncation_keeps_the_closest() -> Result<()> {
    let (neighbors, stats) = radial::generate(&sample_train()?, &origin_query()?, l2()?, 1.0, 1)?;
    assert_eq!(neighbors.width(), 1);
    assert_eq!(neighbors.row(0), &[0]);
    assert_eq!(stats.mean, 1.0);
    Ok(())
}

#[test]
fn radial_all_empty_results() -> Result<()> {
    let test = Matrix::from_rows(vec![vec![100.0, 100.0], vec![-50.0, 20.0]])?;
    let (neighbors, stats) = radial::generate(&sample_train()?, &test, l2()?, 1.0, 4)?;

    assert_eq!(stats.num_zero_neighbors, 2);
    assert_eq!(stats.max, 0);
    assert!(neighbors.as_matrix().as_slice().iter().all(|&v| v == SENTINEL));
    Ok(())
}

#[test]
fn radial_results_are_within_threshold_sorted_and_unique() -> Result<()> {
    let mut rng = StdRng::seed_from_u64(7);
    let train = random_matrix(&mut rng, 300, 8)?;
    let test = random_matrix(&mut rng, 20, 8)?;

    for space in [
        MetricSpace::new(DistanceMetric::L2Squared, None)?,
        MetricSpace::new(DistanceMetric::Cosine, None)?,
        MetricSpace::new(DistanceMetric::InnerProduct, Some(EngineConvention::Faiss))?,
    ] {
        let threshold = match space.metric() {
            DistanceMetric::L2Squared => 2.0,
            DistanceMetric::Cosine => 0.6,
            DistanceMetric::InnerProduct => -0.5,
        };
        let (neighbors, _) = radial::generate(&train, &test, space, threshold, 50)?;
        assert!(neighbors.is_well_formed());

        for q in 0..test.rows() {
            let row = neighbors.neighbors(q);
            let distances: Vec<f32> = row
                .iter()
                .map(|&i| space.distance(test.row(q), train.row(i as usize)))
                .collect::<Result<_>>()?;

            assert!(distances.iter().all(|&d| d <= threshold), "{space} query {q}");
            assert!(distances.windows(2).all(|w| w[0] <= w[1]), "{space} query {q}");

            let mut unique = row.to_vec();
            unique.sort_unstable();
            unique.dedup();
            assert_eq!(unique.len(), row.len());
        }
    }
    Ok(())
}

#[test]
fn radial_truncation_matches_full_sort_and_slice() -> Result<()> {
    let mut rng = StdRng::seed_from_u64(11);
    let train = random_matrix(&mut rng, 500, 4)?;
    let test = random_matrix(&mut rng, 10, 4)?;
    let space = l2()?;
    let (threshold, max_length) = (1.5, 8);

    let (neighbors, _) = radial::generate(&train, &test, space, threshold, max_length)?;

    for q in 0..test.rows() {
        let mut all: Vec<(f32, usize)> = (0..train.rows())
            .map(|i| space.distance(test.row(q), train.row(i)).map(|d| (d, i)))
            .collect::<Result<_>>()?;
        all.retain(|&(d, _)| d <= threshold);
        all.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
        let expected: Vec<i64> = all.iter().take(max_length).map(|&(_, i)| i as i64).collect();

        assert_eq!(neighbors.neighbors(q), expected.as_slice(), "query {q}");
    }
    Ok(())
}

#[test]
fn radial_runs_are_idempotent_and_parallel_matches_sequential() -> Result<()> {
    let mut rng = StdRng::seed_from_u64(3);
    let train = random_matrix(&mut rng, 400, 16)?;
    let test = random_matrix(&mut rng, 40, 16)?;
    let space = MetricSpace::new(DistanceMetric::Cosine, None)?;

    let generator = RadialThresholdGenerator::new(space, 0.8, 32);
    let first = generator.generate(&train, &test)?;
    let second = generator.generate(&train, &test)?;
    let sequential = generator.clone().with_parallel(false).generate(&train, &test)?;

    assert_eq!(first.neighbors, second.neighbors);
    assert_eq!(first.stats, second.stats);
    assert_eq!(first.neighbors, sequential.neighbors);
    assert_eq!(first.stats, sequential.stats);
    Ok(())
}

#[test]
fn inner_product_conventions_agree_on_negated_data() -> Result<()> {
    let mut rng = StdRng::seed_from_u64(19);
    let train = random_matrix(&mut rng, 200, 6)?;
    let test = random_matrix(&mut rng, 12, 6)?;
    let negated = Matrix::new(
        train.rows(),
        train.cols(),
        train.as_slice().iter().map(|v| -v).collect(),
    )?;

    let faiss = MetricSpace::new(DistanceMetric::InnerProduct, Some(EngineConvention::Faiss))?;
    let lucene = MetricSpace::new(DistanceMetric::InnerProduct, Some(EngineConvention::Lucene))?;

    let (from_faiss, faiss_stats) = radial::generate(&train, &test, faiss, -0.2, 64)?;
    let (from_lucene, lucene_stats) = radial::generate(&negated, &test, lucene, -0.2, 64)?;

    assert_eq!(from_faiss, from_lucene);
    assert_eq!(faiss_stats, lucene_stats);
    Ok(())
}
