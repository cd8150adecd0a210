use anyhow::{Context, Result};
use std::marker::PhantomData;
use std::sync::Arc;

/// Defines the core `Transform` trait for composable preprocessing pipelines.
///
/// A `Transform<I, O>` converts an input of type `I` into an output of type `O`.
/// Steps are chained with `.then(...)` into a single statically dispatched
/// pipeline, e.g. `RandomCrop -> RandomHorizontalFlip -> ToTensor -> Normalize`.
///
/// Note: `then()` works only when:
/// 1. **Types align**: `self: Transform<I, O>`, `next: Transform<O, M>`
/// 2. **Owned**: `Self::Sized` (no trait objects, must be concrete)
/// 3. **Thread-safe**: intermediate and output types must be `Send`
pub trait Transform<I, O>: Send + Sync {
    /// Applies the transformation to the input
    fn apply(&self, input: I) -> Result<O>;

    #[inline]
    fn then<T, M>(self, next: T) -> Chain<Self, T, O>
    where
        Self: Sized,
        T: Transform<O, M>,
        O: Send,
        M: Send,
    {
        Chain {
            first: self,
            second: next,
            _marker: PhantomData,
        }
    }
}

/// Shared pipelines are themselves transforms, so a dataset can hold one
/// behind an `Arc` and hand it to every worker thread.
impl<I, O, T> Transform<I, O> for Arc<T>
where
    T: Transform<I, O> + ?Sized,
{
    fn apply(&self, input: I) -> Result<O> {
        (**self).apply(input)
    }
}

/// A chain of two transforms (`A` -> `B`)
/// - `PhantomData<M>` enforces intermediate type alignment.
#[derive(Debug)]
pub struct Chain<A, B, M> {
    first: A,
    second: B,
    _marker: PhantomData<fn() -> M>,
}

impl<A, B, M> Chain<A, B, M> {
    /// Creates a new transform chain.
    /// Prefer [`Transform::then`]; `Chain::new` is handy when a pipeline is
    /// assembled from runtime options.
    pub fn new(first: A, second: B) -> Self {
        Self {
            first,
            second,
            _marker: PhantomData,
        }
    }
}

impl<I, M, O, A, B> Transform<I, O> for Chain<A, B, M>
where
    A: Transform<I, M>,
    B: Transform<M, O>,
    M: Send,
{
    fn apply(&self, input: I) -> Result<O> {
        self.first
            .apply(input)
            .and_then(|mid| self.second.apply(mid))
            .with_context(|| {
                format!(
                    "Transform chain failed: {} → {} → {}",
                    std::any::type_name::<A>(),
                    std::any::type_name::<B>(),
                    std::any::type_name::<O>()
                )
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use tch::{Kind, Tensor};

    struct Scale(f64);
    impl Transform<Tensor, Tensor> for Scale {
        fn apply(&self, input: Tensor) -> Result<Tensor> {
            Ok(input * self.0)
        }
    }

    struct Sum;
    impl Transform<Tensor, f64> for Sum {
        fn apply(&self, input: Tensor) -> Result<f64> {
            Ok(input.sum(Kind::Double).double_value(&[]))
        }
    }

    #[test]
    fn test_pipeline_construction_using_then() -> Result<()> {
        let pipeline = Scale(2.0).then(Sum);
        assert_eq!(pipeline.apply(Tensor::from_slice(&[1.0f32, 2.0, 3.0]))?, 12.0);
        Ok(())
    }

    #[test]
    fn test_pipeline_construction_using_chain() -> Result<()> {
        let chain = Chain::new(Scale(0.5), Sum);
        assert_eq!(chain.apply(Tensor::from_slice(&[4.0f32, 4.0]))?, 4.0);
        Ok(())
    }

    #[test]
    fn test_shared_pipeline_behind_arc() -> Result<()> {
        let shared: Arc<dyn Transform<Tensor, f64>> = Arc::new(Scale(3.0).then(Sum));
        let clone = shared.clone();
        assert_eq!(clone.apply(Tensor::from_slice(&[1.0f32]))?, 3.0);
        Ok(())
    }

    #[test]
    fn test_pipeline_chain_error_context() {
        struct Fail;
        impl Transform<Tensor, Tensor> for Fail {
            fn apply(&self, _: Tensor) -> Result<Tensor> {
                Err(anyhow!("Test error"))
            }
        }

        let chain = Chain::new(Scale(1.0), Fail);
        let err = chain.apply(Tensor::from_slice(&[1.0f32])).unwrap_err();
        let msg = err.to_string();

        assert!(msg.contains("Transform chain failed"));
        assert!(msg.contains("Scale"));
        assert!(msg.contains("Fail"));
    }
}
