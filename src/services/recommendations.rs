use serde::Serialize;

use crate::{
    db::{GenreRepo, MovieRepo, Repository},
    error::{AppError, AppResult},
    models::{Movie, User},
    services::providers::CompletionProvider,
};

/// Number of movies the model is asked to pick
pub const AI_PICKS: usize = 3;

/// Movies picked by the completion provider
#[derive(Debug, Serialize)]
pub struct AiRecommendations {
    /// Movie ids as returned by the model
    pub generation: Vec<i32>,
    pub movies: Vec<Movie>,
}

/// Builds the prompt listing every candidate movie and the user's taste
pub fn build_prompt(genre_names: &[String], movies: &[Movie]) -> String {
    let catalog = movies
        .iter()
        .map(|m| format!("- {} (ID: {})", m.title, m.id))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "I want you to recommend the user with top {picks} movies\n\n\
         from the list below:\n{catalog}\n\n\
         based on the following criteria:\n\
         - Highly rated\n\
         - Genre: {genres}\n\n\
         Respond with a JSON array containing exactly {picks} movie IDs, for example [12, 34, 56].",
        picks = AI_PICKS,
        catalog = catalog,
        genres = genre_names.join(", "),
    )
}

/// Parses the model output as a JSON array of movie ids.
///
/// Output wrapped in a markdown code fence is accepted, as is prose around
/// the fence.
pub fn parse_movie_ids(text: &str) -> AppResult<Vec<i32>> {
    let mut body = text.trim();
    if let Some((_, fenced)) = body.split_once("```") {
        let fenced = fenced.split_once("```").map_or(fenced, |(inner, _)| inner);
        body = fenced.trim();
        if body.get(..4).is_some_and(|tag| tag.eq_ignore_ascii_case("json")) {
            body = body[4..].trim();
        }
    }

    serde_json::from_str::<Vec<i32>>(body).map_err(|e| {
        AppError::ExternalApi(format!("Completion is not a JSON array of movie ids: {}", e))
    })
}

async fn generate(
    repo: &dyn Repository,
    provider: &dyn CompletionProvider,
    user: &User,
) -> AppResult<AiRecommendations> {
    let genre_names: Vec<String> = if user.favorite_genres.is_empty() {
        Vec::new()
    } else {
        repo.get_genres(&user.favorite_genres)
            .await?
            .into_iter()
            .map(|g| g.name)
            .collect()
    };

    let candidates = repo.list_all_movies().await?;
    let prompt = build_prompt(&genre_names, &candidates);

    let text = provider.complete(&prompt).await?;
    let generation = parse_movie_ids(&text)?;

    let movies = generation
        .iter()
        .filter_map(|id| candidates.iter().find(|m| m.id == *id).cloned())
        .collect();

    tracing::info!(
        user_id = user.id,
        provider = provider.name(),
        candidates = candidates.len(),
        picks = ?generation,
        "Generated AI recommendations"
    );

    Ok(AiRecommendations { generation, movies })
}

/// Asks the completion provider to pick movies for the user.
///
/// Any failure is logged and reported as one generic error.
pub async fn recommend_with_ai(
    repo: &dyn Repository,
    provider: &dyn CompletionProvider,
    user: &User,
) -> AppResult<AiRecommendations> {
    generate(repo, provider, user).await.map_err(|e| {
        tracing::error!(error = %e, user_id = user.id, "AI recommendation failed");
        AppError::ExternalApi("Failed to generate AI movie recommendations".to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{MemoryRepository, UserRepo};
    use crate::models::{NewMovie, NewUser};
    use crate::services::providers::MockCompletionProvider;
    use chrono::Utc;
    use mockall::predicate::function;

    fn movie(id: i32, title: &str) -> Movie {
        Movie {
            id,
            title: title.to_string(),
            overview: None,
            cover_url: None,
            release_date: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_build_prompt() {
        let prompt = build_prompt(
            &["Action".to_string(), "Drama".to_string()],
            &[movie(1, "Heat"), movie(2, "Ronin")],
        );
        assert!(prompt.contains("- Heat (ID: 1)\n- Ronin (ID: 2)"));
        assert!(prompt.contains("- Highly rated"));
        assert!(prompt.contains("- Genre: Action, Drama"));
        assert!(prompt.contains("exactly 3"));
    }

    #[test]
    fn test_parse_movie_ids() {
        assert_eq!(parse_movie_ids("[3, 1, 2]").unwrap(), vec![3, 1, 2]);
        assert_eq!(parse_movie_ids("```json\n[4, 5, 6]\n```").unwrap(), vec![4, 5, 6]);
        assert_eq!(parse_movie_ids("```\n[7]\n```").unwrap(), vec![7]);
        assert_eq!(parse_movie_ids("```JSON\n[8, 9]\n```").unwrap(), vec![8, 9]);
        assert_eq!(
            parse_movie_ids("Here are my picks:\n```json\n[2, 1]\n```\nEnjoy!").unwrap(),
            vec![2, 1]
        );
        assert!(parse_movie_ids("I recommend Heat").is_err());
        assert!(parse_movie_ids(r#"["Heat"]"#).is_err());
    }

    async fn seeded_repo() -> (MemoryRepository, User) {
        let repo = MemoryRepository::new();
        for title in ["Heat", "Ronin", "Collateral", "Thief"] {
            repo.insert_movie(NewMovie {
                tmdb_id: None,
                title: title.to_string(),
                overview: None,
                cover_url: None,
                release_date: None,
                genre_ids: vec![],
            })
            .await
            .unwrap();
        }
        let user = repo
            .create_user(NewUser {
                username: "vincent".to_string(),
                email: "vincent@example.com".to_string(),
                password_hash: "hash".to_string(),
                favorite_genres: vec![],
            })
            .await
            .unwrap();
        (repo, user)
    }

    #[tokio::test]
    async fn test_recommend_keeps_model_order() {
        let (repo, user) = seeded_repo().await;

        let mut provider = MockCompletionProvider::new();
        provider
            .expect_complete()
            .with(function(|prompt: &str| prompt.contains("- Collateral (ID: 3)")))
            .times(1)
            .returning(|_| Ok("[3, 1, 42]".to_string()));
        provider.expect_name().return_const("mock");

        let recs = recommend_with_ai(&repo, &provider, &user).await.unwrap();
        assert_eq!(recs.generation, vec![3, 1, 42]);
        let titles: Vec<&str> = recs.movies.iter().map(|m| m.title.as_str()).collect();
        assert_eq!(titles, vec!["Collateral", "Heat"]);
    }

    #[tokio::test]
    async fn test_unparseable_completion_fails() {
        let (repo, user) = seeded_repo().await;

        let mut provider = MockCompletionProvider::new();
        provider
            .expect_complete()
            .returning(|_| Ok("Heat is a great film".to_string()));
        provider.expect_name().return_const("mock");

        match recommend_with_ai(&repo, &provider, &user).await {
            Err(AppError::ExternalApi(msg)) => {
                assert_eq!(msg, "Failed to generate AI movie recommendations")
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_provider_failure_is_reported() {
        let (repo, user) = seeded_repo().await;

        let mut provider = MockCompletionProvider::new();
        provider
            .expect_complete()
            .returning(|_| Err(AppError::ExternalApi("quota exceeded".to_string())));
        provider.expect_name().return_const("mock");

        assert!(matches!(
            recommend_with_ai(&repo, &provider, &user).await,
            Err(AppError::ExternalApi(msg)) if msg == "Failed to generate AI movie recommendations"
        ));
    }
}
