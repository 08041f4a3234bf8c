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

use ember_core::renderer::ShaderStage;
use ember_infra::graphics::gl::headless::ObjectKind;
use ember_infra::graphics::gl::shader_cache::{content_hash, ShaderCache};
use ember_infra::graphics::gl::state_cache::StateCache;
use ember_infra::graphics::gl::{GlCall, HeadlessGl};

const VERTEX: &str = "#version 310 es\nvoid main() { gl_Position = vec4(0.0); }\n";
const FRAGMENT_A: &str = "#version 310 es\nprecision mediump float;\nvoid main() {}\n";
const FRAGMENT_B: &str = "#version 310 es\nprecision highp float;\nvoid main() {}\n";

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[test]
fn shaders_are_shared_by_content() {
    init_logger();
    let gl = HeadlessGl::new();
    let mut cache = ShaderCache::new();

    let first = cache.cache_shader(&gl, ShaderStage::Vertex, VERTEX);
    for _ in 0..2 {
        assert_eq!(cache.cache_shader(&gl, ShaderStage::Vertex, VERTEX), first);
    }
    assert_eq!(gl.count(|c| matches!(c, GlCall::CreateShader { .. })), 1);
    assert_eq!(cache.shader_ref_count(ShaderStage::Vertex, VERTEX), Some(3));

    let hash = content_hash(VERTEX);
    cache.release_shader(&gl, ShaderStage::Vertex, hash);
    cache.release_shader(&gl, ShaderStage::Vertex, hash);
    assert_eq!(gl.count(|c| matches!(c, GlCall::DeleteShader(_))), 0);
    cache.release_shader(&gl, ShaderStage::Vertex, hash);
    assert_eq!(gl.count(|c| matches!(c, GlCall::DeleteShader(s) if *s == first)), 1);
    assert_eq!(cache.shader_ref_count(ShaderStage::Vertex, VERTEX), None);
}

#[test]
fn programs_are_keyed_by_every_stage() {
    init_logger();
    let gl = HeadlessGl::new();
    let mut state = StateCache::new(16);
    let mut cache = ShaderCache::new();

    let a = cache.cache_program(&gl, [Some(VERTEX), Some(FRAGMENT_A), None]);
    let again = cache.cache_program(&gl, [Some(VERTEX), Some(FRAGMENT_A), None]);
    let b = cache.cache_program(&gl, [Some(VERTEX), Some(FRAGMENT_B), None]);
    assert_ne!(a, 0);
    assert_eq!(a, again);
    assert_ne!(a, b);
    assert_eq!(cache.take_programs_linked(), 2);
    // The vertex shader is compiled once for both programs.
    assert_eq!(cache.shader_ref_count(ShaderStage::Vertex, VERTEX), Some(2));

    cache.release_program(&gl, &mut state, a);
    cache.release_program(&gl, &mut state, again);
    cache.release_program(&gl, &mut state, b);
    assert_eq!(cache.program_count(), 0);
    assert_eq!(gl.live_objects(ObjectKind::Program), 0);
    assert_eq!(gl.live_objects(ObjectKind::Shader), 0);
}

#[test]
fn link_failures_return_the_null_program() {
    init_logger();
    let gl = HeadlessGl::new();
    let mut cache = ShaderCache::new();
    let program = cache.cache_program(&gl, [Some(VERTEX), Some("#version 310 es\n#error nope\n"), None]);
    assert_eq!(program, 0);
    assert!(cache.take_last_error().is_some());
    assert_eq!(cache.program_count(), 0);
}

#[test]
fn redundant_binds_are_suppressed() {
    init_logger();
    let gl = HeadlessGl::new();
    let mut state = StateCache::new(16);

    state.bind_texture(&gl, 2, glow::TEXTURE_2D, 7);
    state.bind_texture(&gl, 2, glow::TEXTURE_2D, 7);
    state.bind_texture(&gl, 3, glow::TEXTURE_2D, 7);
    assert_eq!(gl.count(|c| matches!(c, GlCall::BindTexture { texture: 7, .. })), 2);

    state.bind_buffer(&gl, glow::UNIFORM_BUFFER, 4);
    state.bind_buffer(&gl, glow::UNIFORM_BUFFER, 4);
    assert_eq!(gl.count(|c| matches!(c, GlCall::BindBuffer { buffer: 4, .. })), 1);

    let counters = state.take_counters();
    assert_eq!(counters.suppressed, 2);

    // After a forget the next bind goes to the driver again.
    state.forget_texture(7);
    state.bind_texture(&gl, 2, glow::TEXTURE_2D, 7);
    assert_eq!(gl.count(|c| matches!(c, GlCall::BindTexture { texture: 7, .. })), 3);
}
