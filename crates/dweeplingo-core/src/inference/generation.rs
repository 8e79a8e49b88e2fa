//! Beam-search decoding
//!
//! The search is independent of the model: each hypothesis carries an opaque
//! state `S` (the decoder with its key/value cache) and a step function turns
//! a prefix into next-token log-probabilities.

use std::cmp::Ordering;

use crate::config::EngineConfig;
use crate::error::{Error, Result};

/// Decoding parameters
#[derive(Debug, Clone)]
pub struct GenerationConfig {
    /// Maximum sequence length, decoder start token included
    pub max_length: usize,
    pub num_beams: usize,
    /// Stop as soon as `num_beams` hypotheses are finished
    pub early_stopping: bool,
    /// Exponent applied to the length when normalizing scores
    pub length_penalty: f32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_length: 128,
            num_beams: 4,
            early_stopping: true,
            length_penalty: 1.0,
        }
    }
}

impl From<&EngineConfig> for GenerationConfig {
    fn from(config: &EngineConfig) -> Self {
        Self {
            max_length: config.max_output_tokens,
            num_beams: config.num_beams,
            early_stopping: config.early_stopping,
            ..Default::default()
        }
    }
}

/// Token ids the search needs to know about
#[derive(Debug, Clone, Copy)]
pub struct DecoderTokens {
    pub start_id: u32,
    pub eos_id: u32,
    /// Never generated
    pub pad_id: u32,
}

struct Hypothesis<S> {
    tokens: Vec<u32>,
    log_prob: f32,
    state: S,
}

struct Finished {
    tokens: Vec<u32>,
    score: f32,
}

fn normalized(log_prob: f32, len: usize, length_penalty: f32) -> f32 {
    log_prob / (len as f32).powf(length_penalty)
}

/// Indices and values of the `k` largest finite entries, best first.
fn top_k(values: &[f32], k: usize) -> Vec<(u32, f32)> {
    let mut indexed: Vec<(u32, f32)> = values
        .iter()
        .enumerate()
        .filter(|(_, v)| v.is_finite())
        .map(|(i, v)| (i as u32, *v))
        .collect();
    let by_score = |a: &(u32, f32), b: &(u32, f32)| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal);
    if indexed.len() > k {
        indexed.select_nth_unstable_by(k, by_score);
        indexed.truncate(k);
    }
    indexed.sort_by(by_score);
    indexed
}

/// Run beam search from `initial` and return the best sequence without the
/// decoder start token and without EOS.
///
/// `step(state, prefix)` must return log-probabilities over the vocabulary
/// for the token following `prefix`, advancing `state` past the last token
/// of `prefix`.
pub fn beam_search<S, F>(
    initial: S,
    tokens: DecoderTokens,
    config: &GenerationConfig,
    mut step: F,
) -> Result<Vec<u32>>
where
    S: Clone,
    F: FnMut(&mut S, &[u32]) -> Result<Vec<f32>>,
{
    if config.num_beams == 0 {
        return Err(Error::ConfigError("num_beams must be at least 1".into()));
    }
    if config.max_length < 2 {
        return Err(Error::ConfigError("max_length must be at least 2".into()));
    }

    let num_beams = config.num_beams;
    let mut beams = vec![Hypothesis {
        tokens: vec![tokens.start_id],
        log_prob: 0.0,
        state: initial,
    }];
    let mut finished: Vec<Finished> = Vec::new();
    let mut done = false;

    while beams[0].tokens.len() < config.max_length {
        let mut candidates: Vec<(usize, u32, f32)> = Vec::with_capacity(beams.len() * num_beams * 2);

        for (b, beam) in beams.iter_mut().enumerate() {
            let mut log_probs = step(&mut beam.state, &beam.tokens)?;
            if let Some(lp) = log_probs.get_mut(tokens.pad_id as usize) {
                *lp = f32::NEG_INFINITY;
            }
            for (token, lp) in top_k(&log_probs, 2 * num_beams) {
                candidates.push((b, token, beam.log_prob + lp));
            }
        }

        if candidates.is_empty() {
            return Err(Error::InferenceError(
                "decoder produced no finite scores".into(),
            ));
        }
        candidates.sort_by(|a, b| b.2.partial_cmp(&a.2).unwrap_or(Ordering::Equal));

        let mut next = Vec::with_capacity(num_beams);
        for (rank, (b, token, log_prob)) in candidates.into_iter().enumerate() {
            if token == tokens.eos_id {
                // Only EOS among the top `num_beams` candidates may close a hypothesis.
                if rank < num_beams {
                    let len = beams[b].tokens.len();
                    finished.push(Finished {
                        tokens: beams[b].tokens.clone(),
                        score: normalized(log_prob, len, config.length_penalty),
                    });
                }
            } else {
                let mut extended = beams[b].tokens.clone();
                extended.push(token);
                next.push(Hypothesis {
                    tokens: extended,
                    log_prob,
                    state: beams[b].state.clone(),
                });
            }
            if next.len() == num_beams {
                break;
            }
        }

        finished.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
        finished.truncate(num_beams);

        done = next.is_empty() || is_done(&finished, &next, config);
        beams = next;
        if done {
            break;
        }
    }

    // Beams cut off by the length limit compete with the finished ones.
    if !done {
        for beam in beams {
            let len = beam.tokens.len();
            finished.push(Finished {
                tokens: beam.tokens,
                score: normalized(beam.log_prob, len, config.length_penalty),
            });
        }
    }

    let best = finished
        .into_iter()
        .max_by(|a, b| a.score.partial_cmp(&b.score).unwrap_or(Ordering::Equal))
        .ok_or_else(|| Error::InferenceError("beam search produced no hypothesis".into()))?;

    Ok(best.tokens.into_iter().skip(1).collect())
}

fn is_done<S>(finished: &[Finished], running: &[Hypothesis<S>], config: &GenerationConfig) -> bool {
    if finished.len() < config.num_beams {
        return false;
    }
    if config.early_stopping {
        return true;
    }
    let worst_finished = finished
        .iter()
        .map(|f| f.score)
        .fold(f32::INFINITY, f32::min);
    let best_running = running
        .iter()
        .map(|h| normalized(h.log_prob, h.tokens.len(), config.length_penalty))
        .fold(f32::NEG_INFINITY, f32::max);
    best_running <= worst_finished
}
