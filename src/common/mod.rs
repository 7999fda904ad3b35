/*
 * Copyright (c) 2024. Govcraft
 *
 * Licensed under either of
 *   * Apache License, Version 2.0 (the "License");
 *     you may not use this file except in compliance with the License.
 *     You may obtain a copy of the License at http://www.apache.org/licenses/LICENSE-2.0
 *   * MIT license: http://opensource.org/licenses/MIT
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the applicable License for the specific language governing permissions and
 * limitations under that License.
 */

//! Shared building blocks: errors, configuration, the addressed-message
//! envelope, and the runtime object.

pub use config::{MeshConfig, CONFIG};
pub use envelope::AddressedMessage;
pub use errors::MeshError;
pub use runtime::MeshRuntime;

/// Configuration loading.
pub mod config;
/// The addressed-message envelope.
pub mod envelope;
/// Error types.
pub mod errors;
/// The runtime object tying the collaborators together.
pub mod runtime;
