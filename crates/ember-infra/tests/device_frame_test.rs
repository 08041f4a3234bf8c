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

use ember_core::math::{Extent2D, LinearRgba, Rect2D};
use ember_core::renderer::{
    AttachmentDescriptor, AttachmentTarget, ClearValue, Command, CommandList, DescriptorBinding,
    DescriptorResource, DescriptorSetData, DescriptorSetLayout, DescriptorSetLayoutBinding,
    DescriptorType, DeviceSettings, FrameStats, GraphicsDevice, ImageDescriptor, ImageId,
    ImageUsage, PipelineBinding, PipelineLayoutDescriptor, PresentMode,
    RenderPassDescriptor, RenderPipelineDescriptor, RenderPipelineId, SamplerDescriptor,
    ShaderModuleDescriptor, ShaderReflection, ShaderResource, ShaderStage, ShaderStageDescriptor,
    SpecializationConstant, SpecializationValue, StorageAccess, SubpassDescriptor,
    SwapchainDescriptor, TextureFormat,
};
use ember_infra::graphics::gl::{GlCall, GlDevice, HeadlessContext, HeadlessGl};

type Device = GlDevice<HeadlessGl, HeadlessContext>;

const VERTEX: &str = "#version 310 es\nvoid main() { gl_Position = vec4(0.0); }\n";
const FRAGMENT: &str = "#version 310 es\nprecision mediump float;\n\
    layout(constant_id = 0) const int MODE = 0;\n\
    uniform sampler2D textures[4];\nout vec4 color;\nvoid main() {}\n";

fn device(gl: HeadlessGl) -> Device {
    let _ = env_logger::builder().is_test(true).try_init();
    let settings: DeviceSettings =
        serde_json::from_str(r#"{ "buffering_count": 3, "validation": true }"#).expect("settings");
    let mut device = GlDevice::new(gl, HeadlessContext::new(), settings);
    device.activate().expect("activate");
    device
}

fn sampled_layout() -> PipelineLayoutDescriptor {
    PipelineLayoutDescriptor {
        label: Some("textures".to_string()),
        set_layouts: vec![DescriptorSetLayout {
            bindings: vec![DescriptorSetLayoutBinding {
                binding: 0,
                ty: DescriptorType::CombinedImageSampler,
                count: 4,
            }],
        }],
        push_constant_size: 0,
    }
}

fn pipeline(device: &mut Device, mode: Option<i32>) -> RenderPipelineId {
    let vertex = device
        .create_shader_module(&ShaderModuleDescriptor {
            label: None,
            stage: ShaderStage::Vertex,
            source: VERTEX.to_string(),
            reflection: ShaderReflection::default(),
        })
        .expect("vertex module");
    let fragment = device
        .create_shader_module(&ShaderModuleDescriptor {
            label: None,
            stage: ShaderStage::Fragment,
            source: FRAGMENT.to_string(),
            reflection: ShaderReflection {
                combined_samplers: vec![ShaderResource::new("textures", 0, 0).with_array_size(4)],
                ..Default::default()
            },
        })
        .expect("fragment module");
    let layout = device.create_pipeline_layout(&sampled_layout()).expect("layout");
    let specialization = mode
        .map(|value| {
            vec![SpecializationConstant {
                id: 0,
                value: SpecializationValue::Int(value),
            }]
        })
        .unwrap_or_default();
    device
        .create_render_pipeline(&RenderPipelineDescriptor {
            label: Some("sampled".to_string()),
            vertex: ShaderStageDescriptor::new(vertex),
            fragment: Some(ShaderStageDescriptor {
                module: fragment,
                specialization,
            }),
            vertex_buffers_layout: Vec::new(),
            layout,
            primitive_state: Default::default(),
            depth_stencil_state: None,
            color_target_states: vec![Default::default()],
            multisample_state: Default::default(),
            blend_constant: Default::default(),
        })
        .expect("pipeline")
}

fn color_image(device: &mut Device, usage: ImageUsage) -> ImageId {
    device
        .create_image(&ImageDescriptor::new_2d(TextureFormat::Rgba8Unorm, 64, 64, usage))
        .expect("image")
}

fn clear_pass(target: ImageId) -> RenderPassDescriptor {
    RenderPassDescriptor {
        attachments: vec![AttachmentDescriptor::new(AttachmentTarget::Image(target), TextureFormat::Rgba8Unorm)
            .with_clear(ClearValue::Color(LinearRgba::default()))],
        subpasses: vec![SubpassDescriptor {
            color_attachments: vec![0],
            ..Default::default()
        }],
        render_area: Rect2D::from_extent(64, 64),
    }
}

fn run_frame(device: &mut Device, commands: Vec<Command>) -> FrameStats {
    device.begin_frame().expect("begin");
    device.submit(&CommandList::new(commands)).expect("submit");
    device.end_frame().expect("end")
}

fn sampled_draw(gl: HeadlessGl) -> (Device, usize) {
    let mut device = device(gl);
    let sampler = device.create_sampler(&SamplerDescriptor::default()).expect("sampler");
    let images: Vec<ImageId> = (0..4).map(|_| color_image(&mut device, ImageUsage::SAMPLED)).collect();
    let target = color_image(&mut device, ImageUsage::COLOR_ATTACHMENT);
    let pipeline = pipeline(&mut device, None);
    let set = DescriptorSetData {
        bindings: vec![DescriptorBinding {
            binding: 0,
            ty: DescriptorType::CombinedImageSampler,
            resources: images
                .iter()
                .map(|&image| DescriptorResource::Image {
                    image,
                    mip_level: 0,
                    access: StorageAccess::ReadOnly,
                    sampler: Some(sampler),
                })
                .collect(),
        }],
    };

    device.gl().clear_calls();
    let stats = run_frame(
        &mut device,
        vec![
            Command::BeginRenderPass(clear_pass(target)),
            Command::BindPipeline(PipelineBinding::Render(pipeline)),
            Command::BindDescriptorSets {
                first_set: 0,
                sets: vec![set],
                dynamic_offsets: Vec::new(),
            },
            Command::Draw {
                vertex_count: 3,
                instance_count: 1,
                first_vertex: 0,
                first_instance: 0,
            },
            Command::EndRenderPass,
        ],
    );
    assert_eq!(stats.draw_calls, 1);
    assert_eq!(stats.skipped_commands, 0);
    let binds = device
        .gl()
        .count(|c| matches!(c, GlCall::BindTexture { texture, .. } if *texture != 0));
    (device, binds)
}

#[test]
fn sampler_arrays_bind_one_texture_per_active_element() {
    let (_device, binds) = sampled_draw(HeadlessGl::new());
    assert_eq!(binds, 4);

    let gl = HeadlessGl::new();
    gl.set_inactive_uniform("textures[3]");
    let (_device, binds) = sampled_draw(gl);
    assert_eq!(binds, 3);
}

#[test]
fn framebuffers_are_reused_then_evicted_once() {
    let mut device = device(HeadlessGl::new());
    let a = color_image(&mut device, ImageUsage::COLOR_ATTACHMENT);
    let b = color_image(&mut device, ImageUsage::COLOR_ATTACHMENT);
    let pass = |image| vec![Command::BeginRenderPass(clear_pass(image)), Command::EndRenderPass];

    assert_eq!(run_frame(&mut device, pass(a)).framebuffers_created, 1);
    assert_eq!(run_frame(&mut device, pass(a)).framebuffers_created, 0);
    assert_eq!(run_frame(&mut device, pass(b)).framebuffers_created, 1);
    assert_eq!(device.cached_framebuffers(), 2);

    // buffering_count 3 + margin 2: an entry idle for more than 5 frames goes.
    let mut evicted = Vec::new();
    for _ in 0..8 {
        evicted.push(run_frame(&mut device, Vec::new()).framebuffers_evicted);
    }
    assert_eq!(evicted, vec![0, 0, 0, 0, 1, 1, 0, 0]);
    assert_eq!(device.cached_framebuffers(), 0);
    assert_eq!(device.gl().count(|c| matches!(c, GlCall::DeleteFramebuffer(_))), 2);

    // A new frame on the same image builds a fresh entry.
    assert_eq!(run_frame(&mut device, pass(a)).framebuffers_created, 1);
}

#[test]
fn destroying_an_image_drops_its_framebuffers() {
    let mut device = device(HeadlessGl::new());
    let image = color_image(&mut device, ImageUsage::COLOR_ATTACHMENT);
    run_frame(&mut device, vec![Command::BeginRenderPass(clear_pass(image)), Command::EndRenderPass]);
    assert_eq!(device.cached_framebuffers(), 1);
    device.destroy_image(image).expect("destroy");
    assert_eq!(device.cached_framebuffers(), 0);
}

#[test]
fn specialization_constants_select_programs() {
    let mut device = device(HeadlessGl::new());
    let p1 = pipeline(&mut device, Some(1));
    let p2 = pipeline(&mut device, Some(2));
    let p3 = pipeline(&mut device, Some(1));
    assert_eq!(device.shader_cache().program_count(), 2);
    assert_eq!(run_frame(&mut device, Vec::new()).programs_linked, 2);

    device.destroy_render_pipeline(p1).expect("p1");
    assert_eq!(device.shader_cache().program_count(), 2);
    device.destroy_render_pipeline(p3).expect("p3");
    assert_eq!(device.shader_cache().program_count(), 1);
    device.destroy_render_pipeline(p2).expect("p2");
    assert_eq!(device.shader_cache().program_count(), 0);
}

#[test]
fn backbuffer_passes_are_flipped() {
    let mut device = device(HeadlessGl::new());
    let swapchain = device
        .create_swapchain(&SwapchainDescriptor {
            surface: 9,
            extent: Extent2D {
                width: 200,
                height: 100,
            },
            format: TextureFormat::Rgba8Unorm,
            present_mode: PresentMode::Fifo,
        })
        .expect("swapchain");
    let pass = RenderPassDescriptor {
        attachments: vec![AttachmentDescriptor::new(AttachmentTarget::Backbuffer, TextureFormat::Rgba8Unorm)
            .with_clear(ClearValue::Color(LinearRgba::default()))],
        subpasses: vec![SubpassDescriptor {
            color_attachments: vec![0],
            ..Default::default()
        }],
        render_area: Rect2D::from_extent(200, 40),
    };
    let stats = run_frame(&mut device, vec![Command::BeginRenderPass(pass), Command::EndRenderPass]);
    assert_eq!(stats.framebuffers_created, 1);
    assert_eq!(device.gl().count(|c| matches!(c, GlCall::CreateFramebuffer(_))), 0);
    // The top 40 rows of a 100-row surface start at row 60 from the bottom.
    assert!(device.gl().calls().contains(&GlCall::Scissor([0, 60, 200, 40])));

    device.present(&[swapchain]);
    assert_eq!(device.provider().presented(), &[9]);
    assert!(device.is_active());
}
