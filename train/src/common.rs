//! Common imports from external crates.

pub use anyhow::{bail, ensure, format_err, Context as _, Error, Result};
pub use futures::stream::{self, StreamExt as _};
pub use indexmap::IndexMap;
pub use itertools::Itertools as _;
pub use label::{ClassVocabulary, LabelError, NormalizedTarget, Normalizer, RawAnnotation};
pub use noisy_float::prelude::*;
pub use rand::{prelude::*, rngs::StdRng};
pub use serde::{Deserialize, Deserializer, Serialize, Serializer};
pub use std::{
    fmt::{self, Debug, Display},
    fs,
    num::NonZeroUsize,
    path::{Path, PathBuf},
    str::FromStr,
    sync::Arc,
    time::{Duration, Instant},
};
pub use tch::{
    nn::{self, OptimizerConfig as _},
    Device, Kind, Tensor,
};
pub use tch_tensor_like::TensorLike;
pub use tokio::sync::mpsc;
pub use tracing::{info, info_span, trace, warn};

pub type Fallible<T> = Result<T, Error>;
