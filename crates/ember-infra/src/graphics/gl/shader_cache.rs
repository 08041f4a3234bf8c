// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Content-addressed cache of native shaders and linked programs.
//!
//! Shaders are keyed by a 64-bit hash of their source per stage, programs by
//! the triple of their stage hashes. Both are reference counted; the native
//! object is deleted when the count drops to zero. Name `0` is the invalid
//! sentinel returned for failed compiles and links.

use super::native::{GlApi, GlName};
use super::state_cache::StateCache;
use ember_core::renderer::{ShaderStage, SpecializationConstant};
use xxhash_rust::xxh3::xxh3_64;

/// Hashes shader source text.
pub fn content_hash(source: &str) -> u64 {
    xxh3_64(source.as_bytes())
}

/// Bakes specialization constants into `source`.
///
/// A `#define SPIRV_CROSS_CONSTANT_ID_<id> <value>` line is inserted after
/// the `#version` directive for each constant, sorted by id so that the same
/// constants always produce the same text.
pub fn specialize_source(source: &str, constants: &[SpecializationConstant]) -> String {
    if constants.is_empty() {
        return source.to_string();
    }
    let mut sorted = constants.to_vec();
    sorted.sort_by_key(|c| c.id);
    let defines: String = sorted
        .iter()
        .map(|c| format!("#define SPIRV_CROSS_CONSTANT_ID_{} {}\n", c.id, c.value))
        .collect();

    match find_version_line_end(source) {
        Some(end) => {
            let mut out = String::with_capacity(source.len() + defines.len() + 1);
            out.push_str(&source[..end]);
            if !out.ends_with('\n') {
                out.push('\n');
            }
            out.push_str(&defines);
            out.push_str(&source[end..]);
            out
        }
        None => format!("{defines}{source}"),
    }
}

/// Byte offset just past the `#version` line, if there is one.
pub(crate) fn find_version_line_end(source: &str) -> Option<usize> {
    let mut offset = 0;
    for line in source.split_inclusive('\n') {
        offset += line.len();
        if line.trim_start().starts_with("#version") {
            return Some(offset);
        }
    }
    None
}

fn shader_type(stage: ShaderStage) -> u32 {
    match stage {
        ShaderStage::Vertex => glow::VERTEX_SHADER,
        ShaderStage::Fragment => glow::FRAGMENT_SHADER,
        ShaderStage::Compute => glow::COMPUTE_SHADER,
    }
}

#[derive(Debug)]
struct ShaderEntry {
    hash: u64,
    shader: GlName,
    ref_count: u32,
}

#[derive(Debug)]
struct ProgramEntry {
    hashes: [Option<u64>; 3],
    program: GlName,
    ref_count: u32,
}

/// Sources of a program, indexed by [`ShaderStage::index`].
pub type ProgramSources<'a> = [Option<&'a str>; 3];

/// The shader and program cache.
#[derive(Debug, Default)]
pub struct ShaderCache {
    shaders: [Vec<ShaderEntry>; 3],
    programs: Vec<ProgramEntry>,
    last_error: Option<String>,
    programs_linked: u32,
}

impl ShaderCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the native shader for `source`, compiling it on a miss.
    ///
    /// ## Returns
    /// The shader name, or `0` if compilation failed. Either way the entry's
    /// reference count was incremented and must be released.
    pub fn cache_shader<G: GlApi + ?Sized>(
        &mut self,
        gl: &G,
        stage: ShaderStage,
        source: &str,
    ) -> GlName {
        let hash = content_hash(source);
        let entries = &mut self.shaders[stage.index()];
        if let Some(entry) = entries.iter_mut().find(|e| e.hash == hash) {
            entry.ref_count += 1;
            log::trace!(
                "ShaderCache: Reusing {stage:?} shader {} (refs {})",
                entry.shader,
                entry.ref_count
            );
            return entry.shader;
        }

        let mut shader = gl.create_shader(shader_type(stage));
        if shader != 0 {
            gl.shader_source(shader, source);
            gl.compile_shader(shader);
            if !gl.get_shader_compile_status(shader) {
                let info = gl.get_shader_info_log(shader);
                log::error!("ShaderCache: {stage:?} shader failed to compile:\n{info}");
                self.last_error = Some(info);
                gl.delete_shader(shader);
                shader = 0;
            } else {
                log::debug!("ShaderCache: Compiled {stage:?} shader {shader} ({hash:016x})");
            }
        } else {
            self.last_error = Some(format!("could not create a {stage:?} shader object"));
        }
        entries.push(ShaderEntry {
            hash,
            shader,
            ref_count: 1,
        });
        shader
    }

    /// Drops one reference to the `stage` shader with source hash `hash`.
    pub fn release_shader<G: GlApi + ?Sized>(&mut self, gl: &G, stage: ShaderStage, hash: u64) {
        let entries = &mut self.shaders[stage.index()];
        let Some(index) = entries.iter().position(|e| e.hash == hash) else {
            log::warn!("ShaderCache: Release of unknown {stage:?} shader {hash:016x}");
            return;
        };
        entries[index].ref_count -= 1;
        if entries[index].ref_count == 0 {
            let entry = entries.remove(index);
            if entry.shader != 0 {
                gl.delete_shader(entry.shader);
                log::debug!("ShaderCache: Deleted {stage:?} shader {}", entry.shader);
            }
        }
    }

    /// Returns the linked program for `sources`, building it on a miss.
    ///
    /// ## Returns
    /// The program name, or `0` if a stage failed to compile or the program
    /// failed to link. The failure details are kept for
    /// [`take_last_error`](Self::take_last_error).
    pub fn cache_program<G: GlApi + ?Sized>(&mut self, gl: &G, sources: ProgramSources<'_>) -> GlName {
        let hashes = sources.map(|s| s.map(content_hash));
        if let Some(entry) = self.programs.iter_mut().find(|e| e.hashes == hashes) {
            entry.ref_count += 1;
            log::trace!(
                "ShaderCache: Reusing program {} (refs {})",
                entry.program,
                entry.ref_count
            );
            return entry.program;
        }

        let mut acquired = Vec::with_capacity(3);
        for stage in ShaderStage::ALL {
            if let Some(source) = sources[stage.index()] {
                let shader = self.cache_shader(gl, stage, source);
                acquired.push((stage, content_hash(source), shader));
            }
        }
        if acquired.is_empty() {
            self.last_error = Some("program has no shader stages".to_string());
            return 0;
        }
        if acquired.iter().any(|(_, _, shader)| *shader == 0) {
            self.release_acquired(gl, &acquired);
            return 0;
        }

        let program = gl.create_program();
        if program == 0 {
            self.last_error = Some("could not create a program object".to_string());
            self.release_acquired(gl, &acquired);
            return 0;
        }
        for (_, _, shader) in &acquired {
            gl.attach_shader(program, *shader);
        }
        gl.link_program(program);
        if !gl.get_program_link_status(program) {
            let info = gl.get_program_info_log(program);
            log::error!("ShaderCache: Program failed to link:\n{info}");
            self.last_error = Some(info);
            gl.delete_program(program);
            self.release_acquired(gl, &acquired);
            return 0;
        }

        self.programs_linked += 1;
        self.programs.push(ProgramEntry {
            hashes,
            program,
            ref_count: 1,
        });
        log::debug!("ShaderCache: Linked program {program}");
        program
    }

    fn release_acquired<G: GlApi + ?Sized>(&mut self, gl: &G, acquired: &[(ShaderStage, u64, GlName)]) {
        for (stage, hash, _) in acquired {
            self.release_shader(gl, *stage, *hash);
        }
    }

    /// Drops one reference to `program`. At zero, its stage shaders are
    /// released, the state cache is scrubbed and the program deleted.
    pub fn release_program<G: GlApi + ?Sized>(&mut self, gl: &G, state: &mut StateCache, program: GlName) {
        let Some(index) = self.programs.iter().position(|e| e.program == program) else {
            log::warn!("ShaderCache: Release of unknown program {program}");
            return;
        };
        self.programs[index].ref_count -= 1;
        if self.programs[index].ref_count > 0 {
            return;
        }
        let entry = self.programs.remove(index);
        for stage in ShaderStage::ALL {
            if let Some(hash) = entry.hashes[stage.index()] {
                self.release_shader(gl, stage, hash);
            }
        }
        state.forget_program(program);
        gl.delete_program(program);
        log::debug!("ShaderCache: Deleted program {program}");
    }

    /// Deletes every cached object regardless of reference counts.
    pub fn destroy_all<G: GlApi + ?Sized>(&mut self, gl: &G, state: &mut StateCache) {
        for entry in self.programs.drain(..) {
            state.forget_program(entry.program);
            gl.delete_program(entry.program);
        }
        for entries in &mut self.shaders {
            for entry in entries.drain(..) {
                if entry.shader != 0 {
                    gl.delete_shader(entry.shader);
                }
            }
        }
    }

    /// Takes the diagnostics of the most recent failure.
    pub fn take_last_error(&mut self) -> Option<String> {
        self.last_error.take()
    }

    /// Returns the number of programs linked since the last call and resets it.
    pub fn take_programs_linked(&mut self) -> u32 {
        std::mem::take(&mut self.programs_linked)
    }

    /// Reference count of the `stage` shader built from `source`.
    pub fn shader_ref_count(&self, stage: ShaderStage, source: &str) -> Option<u32> {
        let hash = content_hash(source);
        self.shaders[stage.index()]
            .iter()
            .find(|e| e.hash == hash)
            .map(|e| e.ref_count)
    }

    /// Reference count of `program`.
    pub fn program_ref_count(&self, program: GlName) -> Option<u32> {
        self.programs
            .iter()
            .find(|e| e.program == program)
            .map(|e| e.ref_count)
    }

    /// Number of cached programs.
    pub fn program_count(&self) -> usize {
        self.programs.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graphics::gl::headless::{GlCall, HeadlessGl, ObjectKind};
    use ember_core::renderer::SpecializationValue;

    const VS: &str = "#version 310 es\nvoid main() { gl_Position = vec4(0.0); }\n";

    #[test]
    fn shader_is_compiled_once_and_deleted_once() {
        let gl = HeadlessGl::new();
        let mut cache = ShaderCache::new();
        let ids: Vec<_> = (0..3)
            .map(|_| cache.cache_shader(&gl, ShaderStage::Vertex, VS))
            .collect();
        assert!(ids.iter().all(|id| *id == ids[0] && *id != 0));
        assert_eq!(cache.shader_ref_count(ShaderStage::Vertex, VS), Some(3));
        assert_eq!(gl.count(|c| matches!(c, GlCall::CompileShader(_))), 1);

        let hash = content_hash(VS);
        for _ in 0..3 {
            cache.release_shader(&gl, ShaderStage::Vertex, hash);
        }
        assert_eq!(gl.count(|c| matches!(c, GlCall::DeleteShader(_))), 1);
        assert_eq!(gl.live_objects(ObjectKind::Shader), 0);
    }

    #[test]
    fn failed_stage_returns_zero_and_releases_shaders() {
        let gl = HeadlessGl::new();
        let mut cache = ShaderCache::new();
        let broken = "#version 310 es\n#error nope\n";
        let program = cache.cache_program(&gl, [Some(VS), Some(broken), None]);

        assert_eq!(program, 0);
        assert!(cache.take_last_error().is_some());
        assert_eq!(cache.shader_ref_count(ShaderStage::Vertex, VS), None);
        assert_eq!(gl.live_objects(ObjectKind::Shader), 0);
        assert_eq!(gl.live_objects(ObjectKind::Program), 0);
    }

    #[test]
    fn specialization_defines_follow_version() {
        let constants = [
            SpecializationConstant {
                id: 3,
                value: SpecializationValue::UInt(4),
            },
            SpecializationConstant {
                id: 1,
                value: SpecializationValue::Bool(false),
            },
        ];
        let out = specialize_source("#version 450\nvoid main() {}\n", &constants);
        assert_eq!(
            out,
            "#version 450\n#define SPIRV_CROSS_CONSTANT_ID_1 false\n#define SPIRV_CROSS_CONSTANT_ID_3 4u\nvoid main() {}\n"
        );
    }

    #[test]
    fn specialization_without_version_prepends() {
        let constants = [SpecializationConstant {
            id: 0,
            value: SpecializationValue::Int(2),
        }];
        assert_eq!(
            specialize_source("void main() {}", &constants),
            "#define SPIRV_CROSS_CONSTANT_ID_0 2\nvoid main() {}"
        );
    }
}
