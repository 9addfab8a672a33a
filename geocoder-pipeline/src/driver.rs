//! The external driver that composes stages (Design Notes §9): owns an
//! ordered list of stages and folds records through them, preserving order.
//! This is the only piece of process-wide state in the pipeline; each stage
//! gets its dependencies injected at construction instead of reaching into
//! a shared container.

use std::time::{Duration, Instant};

use geocoder_core::{GeocoderResult, Query, Stage};

pub struct StageTiming {
    pub stage: &'static str,
    pub elapsed: Duration,
}

pub struct Pipeline {
    stages: Vec<Box<dyn Stage>>,
}

impl Pipeline {
    pub fn new(stages: Vec<Box<dyn Stage>>) -> Self {
        Pipeline { stages }
    }

    /// Runs one record through every stage in order. A stage may fan a
    /// record out into several candidates (step 3's merge can, in principle,
    /// leave ties); every candidate flows into the next stage.
    pub fn run_one(&self, query: Query) -> GeocoderResult<Vec<Query>> {
        let mut records = vec![query];
        for stage in &self.stages {
            let mut next = Vec::with_capacity(records.len());
            for record in records {
                next.extend(stage.process(record)?);
            }
            records = next;
        }
        Ok(records)
    }

    /// Same as [`Pipeline::run_one`], but also records per-stage wall time
    /// for the CLI's optional `--stats` summary.
    pub fn run_one_with_stats(&self, query: Query) -> GeocoderResult<(Vec<Query>, Vec<StageTiming>)> {
        let mut records = vec![query];
        let mut timings = Vec::with_capacity(self.stages.len());
        for stage in &self.stages {
            let start = Instant::now();
            let mut next = Vec::with_capacity(records.len());
            for record in records {
                next.extend(stage.process(record)?);
            }
            records = next;
            timings.push(StageTiming {
                stage: stage.name(),
                elapsed: start.elapsed(),
            });
        }
        Ok((records, timings))
    }

    pub fn run_all(&self, queries: impl IntoIterator<Item = Query>) -> GeocoderResult<Vec<Query>> {
        let mut out = Vec::new();
        for query in queries {
            out.extend(self.run_one(query)?);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geocoder_core::MatchLevel;

    struct Uppercase;
    impl Stage for Uppercase {
        fn name(&self) -> &'static str {
            "uppercase"
        }
        fn process(&self, mut query: Query) -> GeocoderResult<Vec<Query>> {
            query.match_level = MatchLevel::Prefecture;
            Ok(vec![query])
        }
    }

    #[test]
    fn folds_records_through_every_stage_in_order() {
        let pipeline = Pipeline::new(vec![Box::new(Uppercase), Box::new(Uppercase)]);
        let out = pipeline.run_one(Query::new(0, "x")).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].match_level, MatchLevel::Prefecture);
    }

    #[test]
    fn stats_report_one_timing_per_stage() {
        let pipeline = Pipeline::new(vec![Box::new(Uppercase), Box::new(Uppercase)]);
        let (_, timings) = pipeline.run_one_with_stats(Query::new(0, "x")).unwrap();
        assert_eq!(timings.len(), 2);
    }
}
