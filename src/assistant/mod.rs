//! Assistant module for Gasket
//!
//! This module contains the message types, the hosted function-endpoint
//! client, the response pipeline, and the automotive helpers (vehicle
//! extraction, DTC detection, listing analysis, part identification).

pub mod client;
pub mod listing;
pub mod message;
pub mod parts;
pub mod pipeline;
pub mod vehicle;

pub use client::{
    CompletionClient, FunctionEndpointClient, FunctionRequest, FunctionResponse, ServiceKind,
};
pub use listing::{analysis_message, analyze_listing, validate_listing_url, ListingAnalysis};
pub use message::{
    extract_component_diagram, extract_video_links, ChatMessage, ComponentDiagram, MessageBody,
    Sender,
};
pub use parts::{identify_part, load_part_photo, PartIdentification, MAX_IMAGE_BYTES};
pub use pipeline::{
    AssistantReply, PipelineState, ResponsePipeline, ASK_VEHICLE_REPLY,
    ASSISTANT_TIMEOUT_SECONDS, FALLBACK_REPLY,
};
pub use vehicle::{
    detect_dtc_codes, extract_vehicle_info, find_vehicle_in_history, VehicleContext,
};
