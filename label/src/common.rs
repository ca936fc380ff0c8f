pub use indexmap::IndexSet;
pub use num_traits::cast;
pub use serde::{Deserialize, Serialize};
pub use std::{
    convert::TryFrom,
    fmt::{self, Display},
};
