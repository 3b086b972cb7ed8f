//
// Copyright 2026 The Portal Project Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

//! Error type for the compression crate.

use thiserror::Error;

/// Result alias for this crate.
pub type CompressResult<T> = std::result::Result<T, CompressError>;

/// Errors raised while inflating or deflating a raw DEFLATE stream.
#[derive(Debug, Error)]
pub enum CompressError {
    /// The peer's compressed stream was not valid DEFLATE data.
    #[error("corrupt deflate stream: {0}")]
    Corrupt(#[from] flate2::DecompressError),
    /// The local compressor rejected input it should never reject in
    /// practice (out-of-memory class failures).
    #[error("compressor failure: {0}")]
    Compress(#[from] flate2::CompressError),
    /// The in-memory `Write` sink backing a one-shot compressor failed.
    #[error("compressor io failure: {0}")]
    Io(#[from] std::io::Error),
}
