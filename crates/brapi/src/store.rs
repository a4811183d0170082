//! [`BrapiStore`] over the REST client: search criteria per entity and
//! error translation.

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use reconcile_core::brapi::{
    BrapiStore, Germplasm, GermplasmList, Location, Observation, ObservationUnit,
    ObservationUnitQuery, ObservationVariable, Plate, Sample, StoreError, Study, Trial,
};
use reconcile_core::types::ProgramId;

use crate::client::{BrapiClient, BrapiClientError};

impl From<BrapiClientError> for StoreError {
    fn from(err: BrapiClientError) -> Self {
        match err {
            BrapiClientError::ApiError { status, body } => StoreError::Api { status, body },
            BrapiClientError::Request(e) if e.is_decode() => StoreError::Decode(e.to_string()),
            BrapiClientError::Request(e) => StoreError::Transport(e.to_string()),
            e @ BrapiClientError::SearchPending { .. } => StoreError::Unavailable(e.to_string()),
        }
    }
}

/// Build a search body from `(criterion, values)` pairs.
fn criteria(pairs: &[(&str, Vec<String>)]) -> Map<String, Value> {
    pairs
        .iter()
        .map(|(key, values)| (key.to_string(), json!(values)))
        .collect()
}

fn program(program_id: ProgramId) -> Vec<String> {
    vec![program_id.to_string()]
}

#[async_trait]
impl BrapiStore for BrapiClient {
    async fn find_germplasm(
        &self,
        program_id: ProgramId,
        accession_numbers: &[String],
    ) -> Result<Vec<Germplasm>, StoreError> {
        if accession_numbers.is_empty() {
            return Ok(Vec::new());
        }
        let body = criteria(&[
            ("programDbIds", program(program_id)),
            ("accessionNumbers", accession_numbers.to_vec()),
        ]);
        Ok(self.search("germplasm", body).await?)
    }

    async fn find_variables(
        &self,
        program_id: ProgramId,
    ) -> Result<Vec<ObservationVariable>, StoreError> {
        let body = criteria(&[("programDbIds", program(program_id))]);
        Ok(self.search("variables", body).await?)
    }

    async fn find_locations(
        &self,
        program_id: ProgramId,
        names: &[String],
    ) -> Result<Vec<Location>, StoreError> {
        if names.is_empty() {
            return Ok(Vec::new());
        }
        let body = criteria(&[
            ("programDbIds", program(program_id)),
            ("locationNames", names.to_vec()),
        ]);
        Ok(self.search("locations", body).await?)
    }

    async fn find_trials(
        &self,
        program_id: ProgramId,
        names: &[String],
    ) -> Result<Vec<Trial>, StoreError> {
        if names.is_empty() {
            return Ok(Vec::new());
        }
        let body = criteria(&[
            ("programDbIds", program(program_id)),
            ("trialNames", names.to_vec()),
        ]);
        Ok(self.search("trials", body).await?)
    }

    async fn find_studies(&self, trial_db_ids: &[String]) -> Result<Vec<Study>, StoreError> {
        if trial_db_ids.is_empty() {
            return Ok(Vec::new());
        }
        let body = criteria(&[("trialDbIds", trial_db_ids.to_vec())]);
        Ok(self.search("studies", body).await?)
    }

    async fn find_observation_units(
        &self,
        query: &ObservationUnitQuery,
    ) -> Result<Vec<ObservationUnit>, StoreError> {
        let mut pairs = Vec::new();
        if !query.study_db_ids.is_empty() {
            pairs.push(("studyDbIds", query.study_db_ids.clone()));
        }
        if let (Some(source), false) = (&query.reference_source, query.reference_ids.is_empty()) {
            pairs.push(("externalReferenceSources", vec![source.clone()]));
            pairs.push(("externalReferenceIds", query.reference_ids.clone()));
        }
        if pairs.is_empty() {
            return Ok(Vec::new());
        }
        Ok(self.search("observationunits", criteria(&pairs)).await?)
    }

    async fn find_observations(
        &self,
        unit_db_ids: &[String],
    ) -> Result<Vec<Observation>, StoreError> {
        if unit_db_ids.is_empty() {
            return Ok(Vec::new());
        }
        let body = criteria(&[("observationUnitDbIds", unit_db_ids.to_vec())]);
        Ok(self.search("observations", body).await?)
    }

    async fn find_plates(
        &self,
        program_id: ProgramId,
        names: &[String],
    ) -> Result<Vec<Plate>, StoreError> {
        if names.is_empty() {
            return Ok(Vec::new());
        }
        let body = criteria(&[
            ("programDbIds", program(program_id)),
            ("plateNames", names.to_vec()),
        ]);
        Ok(self.search("plates", body).await?)
    }

    async fn find_samples(&self, plate_db_ids: &[String]) -> Result<Vec<Sample>, StoreError> {
        if plate_db_ids.is_empty() {
            return Ok(Vec::new());
        }
        let body = criteria(&[("plateDbIds", plate_db_ids.to_vec())]);
        Ok(self.search("samples", body).await?)
    }

    async fn create_germplasm(&self, items: Vec<Germplasm>) -> Result<Vec<Germplasm>, StoreError> {
        Ok(self.create("germplasm", &items).await?)
    }

    async fn create_list(&self, list: GermplasmList) -> Result<GermplasmList, StoreError> {
        self.create("lists", std::slice::from_ref(&list))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::Decode("list create returned no record".to_string()))
    }

    async fn create_locations(&self, items: Vec<Location>) -> Result<Vec<Location>, StoreError> {
        Ok(self.create("locations", &items).await?)
    }

    async fn create_trials(&self, items: Vec<Trial>) -> Result<Vec<Trial>, StoreError> {
        Ok(self.create("trials", &items).await?)
    }

    async fn create_studies(&self, items: Vec<Study>) -> Result<Vec<Study>, StoreError> {
        Ok(self.create("studies", &items).await?)
    }

    async fn create_observation_units(
        &self,
        items: Vec<ObservationUnit>,
    ) -> Result<Vec<ObservationUnit>, StoreError> {
        Ok(self.create("observationunits", &items).await?)
    }

    async fn create_observations(
        &self,
        items: Vec<Observation>,
    ) -> Result<Vec<Observation>, StoreError> {
        Ok(self.create("observations", &items).await?)
    }

    async fn update_observations(
        &self,
        items: Vec<Observation>,
    ) -> Result<Vec<Observation>, StoreError> {
        let mut body = Map::new();
        for observation in items {
            let id = observation.observation_db_id.clone().ok_or_else(|| {
                StoreError::Decode("observation update without observationDbId".to_string())
            })?;
            let value = serde_json::to_value(&observation)
                .map_err(|e| StoreError::Decode(e.to_string()))?;
            body.insert(id, value);
        }
        Ok(self.update("observations", body).await?)
    }

    async fn create_plates(&self, items: Vec<Plate>) -> Result<Vec<Plate>, StoreError> {
        Ok(self.create("plates", &items).await?)
    }

    async fn create_samples(&self, items: Vec<Sample>) -> Result<Vec<Sample>, StoreError> {
        Ok(self.create("samples", &items).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn criteria_lists_every_key() {
        let body = criteria(&[
            ("programDbIds", vec!["p".to_string()]),
            ("trialNames", vec!["a".to_string(), "b".to_string()]),
        ]);
        assert_eq!(body["programDbIds"], json!(["p"]));
        assert_eq!(body["trialNames"], json!(["a", "b"]));
    }

    #[test]
    fn api_errors_keep_their_status() {
        let err: StoreError = BrapiClientError::ApiError {
            status: 404,
            body: "missing".to_string(),
        }
        .into();
        assert!(matches!(err, StoreError::Api { status: 404, .. }));
    }

    #[tokio::test]
    async fn empty_keys_skip_the_network() {
        // Nothing listens on this port; an actual request would fail.
        let client = BrapiClient::new("http://127.0.0.1:9", None);
        let found = client
            .find_germplasm(ProgramId::nil(), &[])
            .await
            .unwrap();
        assert!(found.is_empty());
        let units = client
            .find_observation_units(&ObservationUnitQuery::default())
            .await
            .unwrap();
        assert!(units.is_empty());
    }
}
