//! Greedy CTC decoding.

use crate::dict::CharDictionary;

/// Decode a `steps x vocab` probability matrix: argmax at each time step,
/// collapse consecutive duplicates, drop blanks (index 0), map the rest
/// through the dictionary.
///
/// Confidence is the mean of the per-step maximum probabilities over the
/// kept steps; an empty decode yields 0.0.
#[must_use]
pub fn greedy_decode(data: &[f32], steps: usize, vocab: usize, dict: &CharDictionary) -> (String, f32) {
    let mut text = String::new();
    let mut kept_probs: Vec<f32> = Vec::new();
    let mut prev_index = usize::MAX;

    for t in 0..steps {
        let row = &data[t * vocab..(t + 1) * vocab];
        let (index, prob) = argmax(row);

        let repeated = index == prev_index;
        prev_index = index;
        if repeated || index == 0 {
            continue;
        }
        text.push_str(dict.lookup(index));
        kept_probs.push(prob);
    }

    let confidence = if kept_probs.is_empty() {
        0.0
    } else {
        kept_probs.iter().sum::<f32>() / kept_probs.len() as f32
    };
    (text, confidence)
}

fn argmax(row: &[f32]) -> (usize, f32) {
    let mut best = 0;
    let mut best_value = f32::NEG_INFINITY;
    for (i, &v) in row.iter().enumerate() {
        if v > best_value {
            best = i;
            best_value = v;
        }
    }
    (best, best_value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dict_abc() -> CharDictionary {
        CharDictionary::from_reader("A\nB\nC\n".as_bytes()).unwrap()
    }

    /// Build a step row with probability 1.0 at `index`.
    fn one_hot(vocab: usize, index: usize) -> Vec<f32> {
        let mut row = vec![0.0; vocab];
        row[index] = 1.0;
        row
    }

    fn matrix(rows: &[usize], vocab: usize) -> Vec<f32> {
        rows.iter().flat_map(|&i| one_hot(vocab, i)).collect()
    }

    #[test]
    fn collapses_runs_and_removes_blanks() {
        // [A A A blank B B] -> "AB"
        let data = matrix(&[1, 1, 1, 0, 2, 2], 4);
        let dict = dict_abc();
        let (text, confidence) = greedy_decode(&data, 6, 4, &dict);
        assert_eq!(text, "AB");
        assert!((confidence - 1.0).abs() < 1e-6);
    }

    #[test]
    fn collapse_is_magnitude_independent() {
        let mut data = matrix(&[1, 1, 1, 0, 2, 2], 4);
        // Perturb the winning probabilities; the decode must not change.
        data[1 * 4 + 1] = 0.6;
        data[4 * 4 + 2] = 0.8;
        let (text, _) = greedy_decode(&data, 6, 4, &dict_abc());
        assert_eq!(text, "AB");
    }

    #[test]
    fn blank_separated_repeats_survive() {
        // [A blank A] -> "AA"
        let data = matrix(&[1, 0, 1], 4);
        let (text, _) = greedy_decode(&data, 3, 4, &dict_abc());
        assert_eq!(text, "AA");
    }

    #[test]
    fn empty_decode_has_zero_confidence() {
        let data = matrix(&[0, 0, 0], 4);
        let (text, confidence) = greedy_decode(&data, 3, 4, &dict_abc());
        assert!(text.is_empty());
        assert_eq!(confidence, 0.0);
    }

    #[test]
    fn confidence_averages_kept_steps_only() {
        let mut data = matrix(&[1, 0, 2], 4);
        data[1] = 0.5; // step 0: A with 0.5
        data[2 * 4 + 2] = 0.9; // step 2: B with 0.9
        let (text, confidence) = greedy_decode(&data, 3, 4, &dict_abc());
        assert_eq!(text, "AB");
        assert!((confidence - 0.7).abs() < 1e-6);
    }

    #[test]
    fn out_of_vocab_argmax_maps_to_question_mark() {
        let small_dict = CharDictionary::from_reader("A\n".as_bytes()).unwrap();
        let data = matrix(&[3], 4);
        let (text, _) = greedy_decode(&data, 1, 4, &small_dict);
        assert_eq!(text, "?");
    }
}
