use std::sync::Arc;

/// L2-normalized face identity vector.
///
/// Backed by an `Arc` so the pipeline can take the active embedding out of
/// the registry without copying 512 floats per frame.
#[derive(Clone, Debug, PartialEq)]
pub struct Embedding {
    values: Arc<[f32]>,
}

impl Embedding {
    /// Normalizes `values` to unit length (a zero vector stays zero).
    pub fn new(mut values: Vec<f32>) -> Self {
        l2_normalize(&mut values);
        Self {
            values: values.into(),
        }
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Dot product of L2-normalized vectors equals cosine similarity.
    pub fn cosine_similarity(&self, other: &Embedding) -> f64 {
        self.values
            .iter()
            .zip(other.values.iter())
            .map(|(x, y)| (*x as f64) * (*y as f64))
            .sum()
    }
}

pub fn l2_normalize(v: &mut [f32]) {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_l2_normalize_unit_vector() {
        let mut v = vec![3.0, 4.0];
        l2_normalize(&mut v);
        assert!((v[0] - 0.6).abs() < 1e-6);
        assert!((v[1] - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_l2_normalize_zero_vector() {
        let mut v = vec![0.0, 0.0, 0.0];
        l2_normalize(&mut v);
        assert_eq!(v, vec![0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_new_normalizes() {
        let e = Embedding::new(vec![0.0, 2.0]);
        assert_eq!(e.values(), &[0.0, 1.0]);
        assert_eq!(e.len(), 2);
    }

    #[test]
    fn test_cosine_similarity() {
        let a = Embedding::new(vec![1.0, 0.0]);
        let b = Embedding::new(vec![0.0, 5.0]);
        assert!((a.cosine_similarity(&a) - 1.0).abs() < 1e-6);
        assert!(a.cosine_similarity(&b).abs() < 1e-6);
    }

    #[test]
    fn test_clone_shares_storage() {
        let a = Embedding::new(vec![1.0; 512]);
        let b = a.clone();
        assert!(Arc::ptr_eq(&a.values, &b.values));
    }
}
