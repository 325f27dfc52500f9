// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Artwork catalogue, narrowed by the caller's policy filter.
//!
//! The route sits behind the `artwork:view` gate, which allows everyone
//! but attaches a price-window filter resolved from configuration. The
//! handler applies whatever filter arrived; it has no policy knowledge of
//! its own.

use axum::{extract::Extension, response::IntoResponse, Json};
use serde::Serialize;
use warden_policy::PolicyFilterContext;

/// Prices are in minor units.
#[derive(Debug, Clone, Serialize)]
pub struct Artwork {
	pub id: &'static str,
	pub title: &'static str,
	pub category: &'static str,
	pub price: i64,
}

#[derive(Debug, Serialize)]
pub struct ArtworksResponse {
	pub artworks: Vec<Artwork>,
	pub total: usize,
}

fn gallery() -> Vec<Artwork> {
	vec![
		Artwork {
			id: "art-001",
			title: "Harbour at Dusk",
			category: "painting",
			price: 1_850_00,
		},
		Artwork {
			id: "art-002",
			title: "Bronze Study II",
			category: "sculpture",
			price: 24_000_00,
		},
		Artwork {
			id: "art-003",
			title: "Linocut, Edition of 40",
			category: "print",
			price: 320_00,
		},
		Artwork {
			id: "art-004",
			title: "Untitled (Cobalt)",
			category: "painting",
			price: 120_000_00,
		},
		Artwork {
			id: "art-005",
			title: "Night Ferry",
			category: "photograph",
			price: 4_750_00,
		},
	]
}

/// GET /api/artworks - list the catalogue the caller may see.
pub async fn list_artworks(
	filter: Option<Extension<PolicyFilterContext>>,
) -> impl IntoResponse {
	let artworks = match filter {
		Some(Extension(filter)) => apply_filter(gallery(), &filter),
		None => gallery(),
	};
	let total = artworks.len();
	Json(ArtworksResponse { artworks, total })
}

fn apply_filter(artworks: Vec<Artwork>, filter: &PolicyFilterContext) -> Vec<Artwork> {
	artworks
		.into_iter()
		.filter(|artwork| match filter {
			PolicyFilterContext::PriceWindow { min, max } => {
				min.is_none_or(|min| artwork.price >= min)
					&& max.is_none_or(|max| artwork.price <= max)
			}
			PolicyFilterContext::CategoryAllowList { categories } => {
				categories.contains(artwork.category)
			}
			PolicyFilterContext::ApprovalCeiling { limit } => artwork.price <= *limit,
		})
		.collect()
}
